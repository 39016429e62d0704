//! Control core: turns raw hardware samples into the per-tick processed
//! state.
//!
//! 1. [`input_snapshot`] - Logical button, d-pad and analog state
//! 2. [`debounce`] - Per-button debounce filter
//! 3. [`hotkeys`] - Reboot-hotkey monitor
//! 4. [`boot`] - Boot action resolution
//! 5. [`control_loop`] - Boot sequence and the paced tick loop
//! 6. [`handoff`] - Publishing the finalized state to other contexts
//!
//! # Architecture
//!
//! ```text
//! raw input ──► Debounce ──► Hotkeys ──► Addons/Processing ──► Hand-off ──► transport
//!                              │
//!                              └──► reboot request
//! ```
//!
//! The loop owns every piece of mutable state; other contexts only see the
//! published copies and the save queue.

pub mod boot;
pub mod control_loop;
pub mod debounce;
pub mod handoff;
pub mod hotkeys;
pub mod input_snapshot;
pub mod processing;

pub use boot::{BootAction, BootMode, ForcedSetupOptions, InputMode, RunMode};
pub use control_loop::{BootOutcome, Collaborators, ControlLoop, ControlLoopError};
pub use handoff::{StatePublisher, StateReader};
pub use input_snapshot::{Buttons, Dpad, InputSnapshot, ProcessedState};
pub use processing::{GamepadProcessor, PassThrough};
