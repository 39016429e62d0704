use super::{ConfigService, Rebooter};
use crate::controller::boot::BootMode;
use crate::persistence::BootModeLatch;
use tracing::info;

/// Simulated reboot: stores the requested mode where the next boot reads it
#[derive(Debug, Clone)]
pub struct HostReboot {
    latch: BootModeLatch,
}

impl HostReboot {
    pub fn new(latch: BootModeLatch) -> Self {
        Self { latch }
    }
}

impl Rebooter for HostReboot {
    fn reboot_into(&mut self, mode: BootMode) {
        info!("Reboot requested into {:?}", mode);
        self.latch.set(mode);
    }
}

/// Stand-in for the web-config server on a host build; only reports that
/// configuration mode is up.
#[derive(Debug, Default)]
pub struct HostConfigService {
    announced: bool,
}

impl HostConfigService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigService for HostConfigService {
    fn poll(&mut self) {
        if !self.announced {
            info!("Web configuration active, hold the web-config hotkey to leave");
            self.announced = true;
        }
    }
}
