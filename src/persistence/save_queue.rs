//! Bounded, non-blocking save queue.
//!
//! Configuration collaborators enqueue through a cloneable [`SaveHandle`];
//! the control loop drains with `try_recv` so a drain never waits.

use super::{DrainReport, SettingsDelta, StorageError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const SAVE_QUEUE_CAPACITY: usize = 64;

/// Enqueue side of the save queue
#[derive(Debug, Clone)]
pub struct SaveHandle {
    sender: mpsc::Sender<SettingsDelta>,
}

impl SaveHandle {
    pub fn enqueue(&self, delta: SettingsDelta) -> Result<(), StorageError> {
        match self.sender.try_send(delta) {
            Ok(()) => {
                debug!("Queued settings change {:?}", delta);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(delta)) => {
                warn!("Save queue full, dropping {:?}", delta);
                Err(StorageError::QueueFull(delta))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(StorageError::QueueClosed),
        }
    }
}

#[derive(Debug)]
pub struct SaveQueue {
    receiver: mpsc::Receiver<SettingsDelta>,
    handle: SaveHandle,
    // Delta whose last write failed, retried before anything newer
    retry: Option<SettingsDelta>,
    max_per_drain: usize,
}

impl SaveQueue {
    pub fn new(max_per_drain: usize) -> Self {
        let (sender, receiver) = mpsc::channel(SAVE_QUEUE_CAPACITY);
        Self {
            receiver,
            handle: SaveHandle { sender },
            retry: None,
            max_per_drain: max_per_drain.max(1),
        }
    }

    pub fn handle(&self) -> SaveHandle {
        self.handle.clone()
    }

    pub fn has_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Hands up to `max_per_drain` deltas, oldest first, to `write`.
    ///
    /// Stops at the first failing write and keeps that delta for the next
    /// drain. Writes that succeeded before the failure are still counted.
    pub fn drain(
        &mut self,
        mut write: impl FnMut(&SettingsDelta) -> Result<(), StorageError>,
    ) -> DrainReport {
        let mut written = 0;
        while written < self.max_per_drain {
            let delta = match self.retry.take() {
                Some(delta) => delta,
                None => match self.receiver.try_recv() {
                    Ok(delta) => delta,
                    // Empty, or every sender (including ours) is gone
                    Err(_) => break,
                },
            };

            if let Err(e) = write(&delta) {
                warn!("Saving {:?} failed, will retry next tick: {}", delta, e);
                self.retry = Some(delta);
                return DrainReport {
                    written,
                    failure: Some(e),
                };
            }
            written += 1;
        }

        if written > 0 {
            debug!("Drained {} pending saves", written);
        }
        DrainReport {
            written,
            failure: None,
        }
    }
}
