use color_eyre::{eyre::eyre, Result};
use padcore::config::CoreConfig;
use padcore::controller::{BootMode, BootOutcome, Collaborators, ControlLoop, PassThrough};
use padcore::persistence::{BootModeLatch, PersistedSettings, SettingsStore};
use padcore::platform::{GilrsInput, HostConfigService, HostReboot};
use padcore::transport;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// Roughly a USB full-speed HID polling interval
const TRANSPORT_INTERVAL: Duration = Duration::from_millis(8);

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = CoreConfig::default_path();
    let config = CoreConfig::load(config_path.as_deref())?;
    info!("Core config: {:?}", config);

    // Survives the simulated reboots below
    let latch = BootModeLatch::new();
    let settings_path = SettingsStore::default_path();

    loop {
        let store = match &settings_path {
            Some(path) => {
                SettingsStore::open(path.clone(), latch.clone(), config.max_saves_per_tick)
            }
            None => {
                warn!("No data directory available, settings are kept in memory");
                SettingsStore::in_memory(
                    PersistedSettings::default(),
                    latch.clone(),
                    config.max_saves_per_tick,
                )
            }
        };
        let collaborators = Collaborators {
            storage: Box::new(store),
            input: Box::new(GilrsInput::create()?),
            rebooter: Box::new(HostReboot::new(latch.clone())),
            processor: Box::new(PassThrough),
            config_service: Box::new(HostConfigService::new()),
        };

        let control = match ControlLoop::create(config.clone(), collaborators)?.boot() {
            BootOutcome::Serving(control) => control,
            BootOutcome::Rebooted(mode) => {
                info!("Boot requested {:?}, leaving the firmware", mode);
                return Ok(());
            }
        };

        let shutdown = CancellationToken::new();
        let consumer = tokio::spawn(transport::run_consumer(
            control.subscribe(),
            TRANSPORT_INTERVAL,
            shutdown.clone(),
        ));

        let mode = control.run().await;
        shutdown.cancel();
        consumer
            .await
            .map_err(|e| eyre!("Transport consumer failed: {}", e))?;

        if mode == BootMode::Usb {
            info!("Entering USB bootloader, leaving the firmware");
            return Ok(());
        }
        info!("Simulated restart into {:?}", mode);
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
