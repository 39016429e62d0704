use crate::controller::input_snapshot::ProcessedState;

/// Core gamepad processing run between the two addon phases.
///
/// Treated as a pure function of the processed state: implementations read
/// and rewrite `state` and keep nothing that depends on the tick.
pub trait GamepadProcessor {
    fn process(&mut self, state: &mut ProcessedState);
}

/// Leaves the state as the pre-process addons produced it
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl GamepadProcessor for PassThrough {
    fn process(&mut self, _state: &mut ProcessedState) {}
}

impl<F> GamepadProcessor for F
where
    F: FnMut(&mut ProcessedState),
{
    fn process(&mut self, state: &mut ProcessedState) {
        self(state)
    }
}
