//! Ordered, phase-gated addon dispatch.

use super::{Addon, Phase, PhaseSet};
use crate::controller::input_snapshot::ProcessedState;
use tracing::{debug, error, info};

/// Outcome of registering an addon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddonStatus {
    /// Registered and dispatched in its phases
    Active,
    /// Reported itself disabled; kept out of the registry
    Disabled,
    /// Setup failed; registered but never dispatched
    Excluded(String),
}

struct AddonEntry {
    addon: Box<dyn Addon>,
    phases: PhaseSet,
    active: bool,
}

/// Registry of addons, dispatched in registration order
#[derive(Default)]
pub struct AddonPipeline {
    entries: Vec<AddonEntry>,
}

impl AddonPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an addon for `phases` and runs its setup.
    ///
    /// The call order of `register` is the dispatch order.
    pub fn register(&mut self, mut addon: Box<dyn Addon>, phases: PhaseSet) -> AddonStatus {
        let name = addon.name().to_string();
        if !addon.is_enabled() {
            debug!("Addon {} is disabled, skipping registration", name);
            return AddonStatus::Disabled;
        }

        let status = match addon.setup() {
            Ok(()) => {
                info!(
                    "Addon {} registered at position {} for {:?}",
                    name,
                    self.entries.len(),
                    phases
                );
                AddonStatus::Active
            }
            Err(e) => {
                error!("Addon {} failed setup and is excluded: {}", name, e);
                AddonStatus::Excluded(e.to_string())
            }
        };

        self.entries.push(AddonEntry {
            addon,
            phases,
            active: status == AddonStatus::Active,
        });
        status
    }

    /// Runs every active addon registered for `phase`, in order.
    pub fn dispatch(&mut self, phase: Phase, state: &mut ProcessedState) {
        for entry in self
            .entries
            .iter_mut()
            .filter(|entry| entry.active && entry.phases.contains(PhaseSet::from(phase)))
        {
            match phase {
                Phase::PreProcess => entry.addon.preprocess(state),
                Phase::PostProcess => entry.addon.postprocess(state),
            }
        }
    }

    /// Names of addons that will be dispatched, in order
    pub fn active_addons(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.addon.name().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
