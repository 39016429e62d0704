//! Input-transform addons.
//!
//! An addon is an independently registered unit that rewrites the processed
//! state during one or both pipeline phases:
//!
//! ```text
//! debounce ─► hotkeys ─► PreProcess addons ─► gamepad processing ─► PostProcess addons ─► hand-off
//! ```
//!
//! Phase membership is declared at registration and checked at dispatch.
//! Addons run strictly in registration order, so an addon may rely on every
//! addon registered before it having already run in the same phase.

pub mod pipeline;

pub use pipeline::{AddonPipeline, AddonStatus};

use crate::controller::input_snapshot::ProcessedState;
use bitflags::bitflags;
use std::fmt::{self, Display};

/// Pipeline phase an addon can take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before core gamepad processing
    PreProcess,
    /// After core gamepad processing
    PostProcess,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PreProcess => write!(f, "PreProcess"),
            Phase::PostProcess => write!(f, "PostProcess"),
        }
    }
}

bitflags! {
    /// Set of phases requested at registration
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PhaseSet: u8 {
        const PRE = 1 << 0;
        const POST = 1 << 1;
    }
}

impl PhaseSet {
    pub const NONE: PhaseSet = PhaseSet::empty();
    pub const BOTH: PhaseSet = PhaseSet::all();
}

impl From<Phase> for PhaseSet {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::PreProcess => PhaseSet::PRE,
            Phase::PostProcess => PhaseSet::POST,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddonError {
    #[error("Addon hardware unavailable: {0}")]
    HardwareUnavailable(String),
}

/// Contract every addon fulfils.
///
/// `preprocess` and `postprocess` receive exclusive access to the state for
/// the duration of the call only, and must not block: the tick period is the
/// only budget they share.
pub trait Addon {
    /// Stable name used in logs
    fn name(&self) -> &str;

    /// Disabled addons are never registered
    fn is_enabled(&self) -> bool {
        true
    }

    /// One-time initialization. A failure excludes the addon from dispatch.
    fn setup(&mut self) -> Result<(), AddonError> {
        Ok(())
    }

    fn preprocess(&mut self, _state: &mut ProcessedState) {}

    fn postprocess(&mut self, _state: &mut ProcessedState) {}
}
