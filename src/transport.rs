//! Stand-in for the USB transport: samples the published state on its own
//! schedule, independent of the control loop's tick rate.

use crate::controller::handoff::StateReader;
use crate::controller::input_snapshot::ProcessedState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Samples `reader` every `interval` until `shutdown` is cancelled.
///
/// Logs each newly published state whose input differs from the last one
/// seen and returns the number of samples taken.
pub async fn run_consumer(
    mut reader: StateReader,
    interval: Duration,
    shutdown: CancellationToken,
) -> u64 {
    info!("Transport consumer started, sampling every {:?}", interval);
    let mut samples = 0;
    let mut last: Option<ProcessedState> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Transport consumer stopped after {} samples", samples);
                return samples;
            }

            _ = tokio::time::sleep(interval) => {
                samples += 1;
                let Some(state) = reader.read_if_changed() else {
                    continue;
                };
                if last.map(|prev| prev.input) != Some(state.input) {
                    debug!("Report changed: {}", state);
                }
                last = Some(state);
            }
        }
    }
}
