//! Platform collaborators: raw input sampling, reboot and the web-config
//! service.

pub mod gilrs_input;
pub mod host;

pub use gilrs_input::GilrsInput;
pub use host::{HostConfigService, HostReboot};

use crate::controller::boot::BootMode;
use crate::controller::input_snapshot::InputSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to initialize input backend: {0}")]
    InitializationError(String),

    #[error("Failed to read input: {0}")]
    ReadError(String),
}

/// Hardware-read collaborator.
///
/// `read_raw_input` must return well within one tick period.
pub trait InputReader {
    fn read_raw_input(&mut self) -> Result<InputSnapshot, InputError>;
}

/// Reboot collaborator.
///
/// On hardware `reboot_into` never returns. Host implementations record the
/// request and return; the control loop stops right after calling it either
/// way.
pub trait Rebooter {
    fn reboot_into(&mut self, mode: BootMode);
}

/// Web-configuration service collaborator, polled once per web-config cycle.
///
/// Must return without blocking; it shares the cycle with the reboot hotkey.
pub trait ConfigService {
    fn poll(&mut self);
}

impl<F> InputReader for F
where
    F: FnMut() -> InputSnapshot,
{
    fn read_raw_input(&mut self) -> Result<InputSnapshot, InputError> {
        Ok(self())
    }
}
