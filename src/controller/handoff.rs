//! Cross-context hand-off of the finalized per-tick state.
//!
//! The control loop publishes a complete copy of its [`ProcessedState`] once
//! per tick through a `watch` channel. The channel swaps the whole value
//! under its internal lock, so a reader sees either the previous or the new
//! tick, never a mixture, and the writer only waits for a reader that is in
//! the middle of copying the value out.

use crate::controller::input_snapshot::ProcessedState;
use tokio::sync::watch;
use tracing::debug;

/// Write side, owned by the control loop
#[derive(Debug)]
pub struct StatePublisher {
    sender: watch::Sender<ProcessedState>,
}

/// Read side handed to transport consumers
#[derive(Debug, Clone)]
pub struct StateReader {
    receiver: watch::Receiver<ProcessedState>,
}

/// Creates a connected publisher/reader pair seeded with an idle state.
pub fn channel() -> (StatePublisher, StateReader) {
    let (sender, receiver) = watch::channel(ProcessedState::default());
    debug!("Created hand-off channel for processed state");
    (StatePublisher { sender }, StateReader { receiver })
}

impl StatePublisher {
    /// Replaces the live snapshot. Succeeds with or without readers.
    pub fn publish(&self, state: &ProcessedState) {
        self.sender.send_replace(*state);
    }

    pub fn subscribe(&self) -> StateReader {
        StateReader {
            receiver: self.sender.subscribe(),
        }
    }
}

impl StateReader {
    /// Copies out the most recently published complete snapshot.
    pub fn read_latest_processed_state(&self) -> ProcessedState {
        *self.receiver.borrow()
    }

    /// Like [`StateReader::read_latest_processed_state`], but only when a new
    /// snapshot arrived since this reader last looked.
    pub fn read_if_changed(&mut self) -> Option<ProcessedState> {
        match self.receiver.has_changed() {
            Ok(true) => Some(*self.receiver.borrow_and_update()),
            _ => None,
        }
    }
}
