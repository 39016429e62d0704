//! Debounce filter for button and dpad transitions.
//!
//! A transition is accepted for a single input only once the raw level has
//! differed from the stable level on every sample for at least the configured
//! window. Inputs are filtered independently of each other; analog channels
//! pass through untouched.

use crate::controller::input_snapshot::{Buttons, Dpad, InputSnapshot};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const BUTTON_BITS: usize = u32::BITS as usize;
const DPAD_BITS: usize = u8::BITS as usize;

#[derive(Debug, Clone)]
pub struct DebounceFilter {
    window: Duration,
    stable: InputSnapshot,
    // Instant each input first disagreed with its stable level, if it does
    button_pending: [Option<Instant>; BUTTON_BITS],
    dpad_pending: [Option<Instant>; DPAD_BITS],
}

impl DebounceFilter {
    /// A zero window turns the filter into a pass-through.
    pub fn new(window: Duration) -> Self {
        debug!("Creating debounce filter with {:?} window", window);
        Self {
            window,
            stable: InputSnapshot::default(),
            button_pending: [None; BUTTON_BITS],
            dpad_pending: [None; DPAD_BITS],
        }
    }

    /// Feeds one raw sample taken at `now` and returns the new stable snapshot.
    pub fn apply(&mut self, raw: &InputSnapshot, now: Instant) -> InputSnapshot {
        let buttons = debounce_bits(
            self.stable.buttons.bits(),
            raw.buttons.bits(),
            &mut self.button_pending,
            now,
            self.window,
        );
        let dpad = debounce_bits(
            u32::from(self.stable.dpad.bits()),
            u32::from(raw.dpad.bits()),
            &mut self.dpad_pending,
            now,
            self.window,
        );

        self.stable = InputSnapshot {
            buttons: Buttons::from_bits_retain(buttons),
            // Only the low byte is ever fed in, so the cast is lossless
            dpad: Dpad::from_bits_retain(dpad as u8),
            analog: raw.analog,
        };
        self.stable
    }
}

fn debounce_bits(
    stable: u32,
    raw: u32,
    pending: &mut [Option<Instant>],
    now: Instant,
    window: Duration,
) -> u32 {
    let mut result = stable;
    for (index, since) in pending.iter_mut().enumerate() {
        let bit = 1u32 << index;
        if (stable ^ raw) & bit == 0 {
            *since = None;
            continue;
        }

        let started = *since.get_or_insert(now);
        if now.saturating_duration_since(started) >= window {
            result ^= bit;
            *since = None;
        }
    }
    result
}
