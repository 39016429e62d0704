use crate::addons::{Addon, AddonPipeline, AddonStatus, Phase, PhaseSet};
use crate::config::{ConfigError, CoreConfig};
use crate::controller::boot::{resolve_boot_action, BootAction, BootMode, InputMode, RunMode};
use crate::controller::debounce::DebounceFilter;
use crate::controller::handoff::{self, StatePublisher, StateReader};
use crate::controller::hotkeys::RebootHotkeyMonitor;
use crate::controller::input_snapshot::{InputSnapshot, ProcessedState};
use crate::controller::processing::GamepadProcessor;
use crate::persistence::{SettingsDelta, Storage};
use crate::platform::{ConfigService, InputReader, Rebooter};
use chrono::Local;
use statum::{machine, state};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ControlLoopError {
    #[error("Invalid core configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Addon registration is closed once the loop has booted")]
    RegistrationClosed,
}

/// Collaborators the loop drives, all owned by the loop task
pub struct Collaborators {
    pub storage: Box<dyn Storage>,
    pub input: Box<dyn InputReader>,
    pub rebooter: Box<dyn Rebooter>,
    pub processor: Box<dyn GamepadProcessor>,
    pub config_service: Box<dyn ConfigService>,
}

#[state]
#[derive(Debug, Clone)]
pub enum LoopState {
    Booting,
    Serving,
}

#[machine]
pub struct ControlLoop<S: LoopState> {
    config: CoreConfig,
    storage: Box<dyn Storage>,
    input: Box<dyn InputReader>,
    rebooter: Box<dyn Rebooter>,
    processor: Box<dyn GamepadProcessor>,
    config_service: Box<dyn ConfigService>,

    // Registered during boot, set up once the boot action is handled
    pending_addons: Vec<(Box<dyn Addon>, PhaseSet)>,
    addons: AddonPipeline,

    debounce: DebounceFilter,
    hotkeys: RebootHotkeyMonitor,
    publisher: StatePublisher,

    run_mode: RunMode,
    input_mode: InputMode,
    processed: ProcessedState,
    // Reused when a hardware read fails
    last_raw: InputSnapshot,
    stats: LoopStats,
}

/// Result of the boot sequence
pub enum BootOutcome {
    Serving(ControlLoop<Serving>),
    /// The boot action already requested a reboot; nothing is served
    Rebooted(BootMode),
}

// Implementation of methods available in all states
impl<S: LoopState> ControlLoop<S> {
    pub fn subscribe(&self) -> StateReader {
        self.publisher.subscribe()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Applies queued settings changes, bounded per call.
    fn drain_saves(&mut self) {
        let report = self.storage.drain_pending_saves();
        if report.written > 0 {
            debug!("Drained {} settings change(s)", report.written);
            self.stats.saves_written += report.written as u64;
        }

        match report.failure {
            Some(e) => {
                self.stats.save_failures += 1;
                if !self.stats.save_failing {
                    warn!("Saving settings failed, retrying next cycle: {}", e);
                    self.stats.save_failing = true;
                }
            }
            None => self.stats.save_failing = false,
        }
    }

    fn read_input(&mut self) -> InputSnapshot {
        match self.input.read_raw_input() {
            Ok(raw) => {
                self.last_raw = raw;
                raw
            }
            Err(e) => {
                self.stats.read_failures += 1;
                debug!("Input read failed, reusing previous sample: {}", e);
                self.last_raw
            }
        }
    }

    fn reboot(&mut self, mode: BootMode) -> BootMode {
        info!("Control loop stopping for reboot into {:?}", mode);
        self.rebooter.reboot_into(mode);
        mode
    }
}

// Implementation for Booting state
impl ControlLoop<Booting> {
    pub fn create(
        config: CoreConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ControlLoopError> {
        config.validate()?;
        debug!("Creating control loop with config: {:?}", config);

        let (publisher, _) = handoff::channel();
        let debounce = DebounceFilter::new(config.debounce_window());
        let hotkeys = RebootHotkeyMonitor::new(config.hotkeys());
        let stats = LoopStats::new(config.stats_interval(), Instant::now());
        let input_mode = collaborators.storage.gamepad_options().input_mode;

        Ok(Self::new(
            config,
            collaborators.storage,
            collaborators.input,
            collaborators.rebooter,
            collaborators.processor,
            collaborators.config_service,
            Vec::new(),
            AddonPipeline::new(),
            debounce,
            hotkeys,
            publisher,
            RunMode::Gamepad,
            input_mode,
            ProcessedState::default(),
            InputSnapshot::default(),
            stats,
        ))
    }

    /// Queues an addon for setup at the end of boot.
    ///
    /// The call order here is the dispatch order.
    pub fn register_addon(&mut self, addon: Box<dyn Addon>, phases: PhaseSet) {
        debug!("Queued addon {} for {:?}", addon.name(), phases);
        self.pending_addons.push((addon, phases));
    }

    /// Resolves the boot action, applies it and sets up the addons.
    pub fn boot(mut self) -> BootOutcome {
        let directive = self.storage.take_boot_directive();
        let forced = self.storage.forced_setup_options();
        let input = &mut self.input;
        let last_raw = &mut self.last_raw;
        let action = resolve_boot_action(directive, forced, || match input.read_raw_input() {
            Ok(raw) => {
                *last_raw = raw;
                raw
            }
            Err(e) => {
                warn!("Boot input sample failed, treating as idle: {}", e);
                InputSnapshot::default()
            }
        });

        match action {
            BootAction::EnterUsbMode => {
                return BootOutcome::Rebooted(self.reboot(BootMode::Usb));
            }
            BootAction::EnterWebConfigMode => self.run_mode = RunMode::WebConfig,
            BootAction::SetInputMode(mode) => {
                self.run_mode = RunMode::Gamepad;
                if mode != self.input_mode {
                    info!("Switching input mode from {} to {}", self.input_mode, mode);
                    if let Err(e) = self.storage.enqueue_save(SettingsDelta::InputMode(mode)) {
                        error!("Could not queue input mode change: {}", e);
                    }
                    self.input_mode = mode;
                }
            }
            BootAction::None => self.run_mode = RunMode::Gamepad,
        }

        for (addon, phases) in std::mem::take(&mut self.pending_addons) {
            if let AddonStatus::Excluded(reason) = self.addons.register(addon, phases) {
                debug!("Addon excluded from dispatch: {}", reason);
            }
        }

        info!(
            "Boot complete: run mode {:?}, input mode {}, {} addon(s) active",
            self.run_mode,
            self.input_mode,
            self.addons.active_addons().len()
        );
        BootOutcome::Serving(self.transition())
    }
}

// Implementation for Serving state
impl ControlLoop<Serving> {
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn active_addons(&self) -> Vec<String> {
        self.addons.active_addons()
    }

    pub fn register_addon(
        &mut self,
        _addon: Box<dyn Addon>,
        _phases: PhaseSet,
    ) -> Result<(), ControlLoopError> {
        Err(ControlLoopError::RegistrationClosed)
    }

    /// Serves until a reboot is requested and returns the requested mode.
    ///
    /// The reboot collaborator has already been called when this returns.
    pub async fn run(self) -> BootMode {
        match self.run_mode {
            RunMode::Gamepad => self.run_gamepad().await,
            RunMode::WebConfig => self.run_web_config().await,
        }
    }

    async fn run_gamepad(mut self) -> BootMode {
        let period = self.config.tick_period();
        info!("Gamepad loop started with a {:?} tick period", period);

        let mut next_tick = Instant::now();
        loop {
            self.drain_saves();

            if Instant::now() < next_tick {
                sleep_until(next_tick).await;
                continue;
            }

            if let Some(mode) = self.tick(Instant::now()) {
                return self.reboot(mode);
            }

            let now = Instant::now();
            let (next, skipped) = next_tick_after(next_tick, period, now);
            if skipped > 0 {
                self.stats.skipped_periods = self.stats.skipped_periods.saturating_add(skipped);
                debug!("Tick overran, skipping {} period(s)", skipped);
            }
            next_tick = next;
            self.stats.maybe_log(now);
        }
    }

    /// One gamepad tick: sample, debounce, hotkeys, addons, publish.
    ///
    /// Returns the requested boot mode when the hotkey monitor fires, in
    /// which case nothing is published for this tick.
    fn tick(&mut self, now: Instant) -> Option<BootMode> {
        let raw = self.read_input();
        let stable = self.debounce.apply(&raw, now);

        if let Some(mode) = self.hotkeys.process(&stable, RunMode::Gamepad, now) {
            return Some(mode);
        }

        let tick = self.processed.tick + 1;
        self.processed = ProcessedState::new(tick, stable);
        self.addons.dispatch(Phase::PreProcess, &mut self.processed);
        self.processor.process(&mut self.processed);
        self.addons.dispatch(Phase::PostProcess, &mut self.processed);
        self.processed.tick = tick;

        self.publisher.publish(&self.processed);
        self.stats.ticks += 1;
        None
    }

    async fn run_web_config(mut self) -> BootMode {
        let period = self.config.tick_period();
        info!("Web configuration loop started");

        loop {
            self.drain_saves();
            self.config_service.poll();

            let now = Instant::now();
            let raw = self.read_input();
            if let Some(mode) = self.hotkeys.process(&raw, RunMode::WebConfig, now) {
                return self.reboot(mode);
            }

            self.stats.ticks += 1;
            self.stats.maybe_log(now);
            sleep(period).await;
        }
    }
}

/// Next deadline for fixed-period pacing.
///
/// Deadlines advance from the previous deadline, not from `now`, so the
/// average rate holds. Whole periods already in the past are skipped and
/// their count returned.
pub fn next_tick_after(scheduled: Instant, period: Duration, now: Instant) -> (Instant, u64) {
    let next = scheduled + period;
    if next >= now || period.is_zero() {
        return (next, 0);
    }

    // Landing on the first deadline after `now` without multiplying, so an
    // arbitrarily long stall cannot overflow
    let behind = (now - next).as_nanos();
    let period_nanos = period.as_nanos();
    let missed = u64::try_from(behind / period_nanos)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    let into_period = u64::try_from(behind % period_nanos).unwrap_or(u64::MAX);
    let until_next = period.saturating_sub(Duration::from_nanos(into_period));
    (now + until_next, missed)
}

/// Counters reported periodically by the loop
#[derive(Debug, Clone)]
pub struct LoopStats {
    pub ticks: u64,
    pub skipped_periods: u64,
    pub read_failures: u64,
    pub saves_written: u64,
    pub save_failures: u64,
    save_failing: bool,
    interval: Duration,
    window_start: Instant,
    window_ticks: u64,
}

impl LoopStats {
    fn new(interval: Duration, start: Instant) -> Self {
        Self {
            ticks: 0,
            skipped_periods: 0,
            read_failures: 0,
            saves_written: 0,
            save_failures: 0,
            save_failing: false,
            interval,
            window_start: start,
            window_ticks: 0,
        }
    }

    /// Logs and opens a new window once `interval` has passed since the last
    /// one. Returns whether it logged.
    fn maybe_log(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return false;
        }

        let window = self.ticks - self.window_ticks;
        info!(
            "Loop stats at {}: {:.1} ticks/s, {} skipped periods, {} read failures, {} saves ({} failed)",
            Local::now().format("%H:%M:%S"),
            window as f64 / elapsed.as_secs_f64(),
            self.skipped_periods,
            self.read_failures,
            self.saves_written,
            self.save_failures
        );
        self.window_start = now;
        self.window_ticks = self.ticks;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addons::AddonError;
    use crate::controller::boot::ForcedSetupOptions;
    use crate::controller::input_snapshot::{Buttons, Dpad};
    use crate::controller::processing::PassThrough;
    use crate::persistence::{
        BootModeLatch, DrainReport, GamepadOptions, PersistedSettings, SaveQueue, SettingsStore,
        StorageError,
    };
    use crate::platform::{HostReboot, InputError};
    use std::cell::{Cell, RefCell};
    use std::io;
    use std::rc::Rc;

    struct CountingService(Rc<Cell<u64>>);

    impl ConfigService for CountingService {
        fn poll(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    struct Harness {
        latch: BootModeLatch,
        polls: Rc<Cell<u64>>,
    }

    fn build(
        settings: PersistedSettings,
        boot: BootMode,
        input: impl InputReader + 'static,
    ) -> (ControlLoop<Booting>, Harness) {
        let latch = BootModeLatch::new();
        latch.set(boot);
        let polls = Rc::new(Cell::new(0));
        let storage = Box::new(SettingsStore::in_memory(settings, latch.clone(), 4));
        let collaborators = collaborators(storage, &latch, input, polls.clone());
        let control =
            ControlLoop::create(CoreConfig::default(), collaborators).expect("valid config");
        (control, Harness { latch, polls })
    }

    fn collaborators(
        storage: Box<dyn Storage>,
        latch: &BootModeLatch,
        input: impl InputReader + 'static,
        polls: Rc<Cell<u64>>,
    ) -> Collaborators {
        Collaborators {
            storage,
            input: Box::new(input),
            rebooter: Box::new(HostReboot::new(latch.clone())),
            processor: Box::new(PassThrough),
            config_service: Box::new(CountingService(polls)),
        }
    }

    /// Storage whose first `failures` writes fail
    struct FlakyStorage {
        queue: SaveQueue,
        failures: u32,
        written: Rc<RefCell<Vec<SettingsDelta>>>,
    }

    impl Storage for FlakyStorage {
        fn take_boot_directive(&mut self) -> BootMode {
            BootMode::Default
        }

        fn forced_setup_options(&self) -> ForcedSetupOptions {
            ForcedSetupOptions::Unlocked
        }

        fn gamepad_options(&self) -> GamepadOptions {
            GamepadOptions::default()
        }

        fn enqueue_save(&self, delta: SettingsDelta) -> Result<(), StorageError> {
            self.queue.handle().enqueue(delta)
        }

        fn drain_pending_saves(&mut self) -> DrainReport {
            let Self {
                queue,
                failures,
                written,
            } = self;
            queue.drain(|delta| {
                if *failures > 0 {
                    *failures -= 1;
                    return Err(io::Error::other("flash busy").into());
                }
                written.borrow_mut().push(*delta);
                Ok(())
            })
        }
    }

    fn serving(outcome: BootOutcome) -> ControlLoop<Serving> {
        match outcome {
            BootOutcome::Serving(control) => control,
            BootOutcome::Rebooted(mode) => panic!("unexpected reboot into {:?}", mode),
        }
    }

    fn idle() -> InputSnapshot {
        InputSnapshot::default()
    }

    /// Idle for `idle_for`, then holds `buttons` forever.
    /// Hotkeys only arm after an idle stretch, so `idle_for` must cover it.
    fn press_after(idle_for: Duration, buttons: Buttons) -> impl FnMut() -> InputSnapshot {
        let start = Instant::now();
        move || {
            if start.elapsed() < idle_for {
                idle()
            } else {
                InputSnapshot::with_buttons(buttons)
            }
        }
    }

    struct Tagger {
        name: &'static str,
        bit: Buttons,
        enabled: bool,
        fail_setup: bool,
    }

    impl Addon for Tagger {
        fn name(&self) -> &str {
            self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn setup(&mut self) -> Result<(), AddonError> {
            if self.fail_setup {
                Err(AddonError::HardwareUnavailable(self.name.into()))
            } else {
                Ok(())
            }
        }

        fn preprocess(&mut self, state: &mut ProcessedState) {
            state.input.buttons |= self.bit;
        }
    }

    fn tagger(name: &'static str, bit: Buttons) -> Box<Tagger> {
        Box::new(Tagger {
            name,
            bit,
            enabled: true,
            fail_setup: false,
        })
    }

    #[test]
    fn invalid_config_is_rejected() {
        for config in [
            CoreConfig {
                polling_hz: 0,
                ..CoreConfig::default()
            },
            CoreConfig {
                stats_interval_secs: i64::MAX as u64,
                ..CoreConfig::default()
            },
        ] {
            let latch = BootModeLatch::new();
            let storage = Box::new(SettingsStore::in_memory(
                PersistedSettings::default(),
                latch.clone(),
                4,
            ));
            let collaborators = collaborators(storage, &latch, idle, Rc::default());
            assert!(matches!(
                ControlLoop::create(config, collaborators),
                Err(ControlLoopError::Config(_))
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn usb_combo_at_boot_reboots_without_serving() {
        let mut combo = InputSnapshot::with_buttons(Buttons::S1 | Buttons::S2);
        combo.dpad = Dpad::UP;
        let (control, harness) =
            build(PersistedSettings::default(), BootMode::Default, move || combo);

        match control.boot() {
            BootOutcome::Rebooted(mode) => assert_eq!(mode, BootMode::Usb),
            BootOutcome::Serving(_) => panic!("should not serve"),
        }
        assert_eq!(harness.latch.take(), BootMode::Usb);
    }

    #[tokio::test(start_paused = true)]
    async fn boot_shortcut_switches_input_mode() {
        let (control, _harness) = build(PersistedSettings::default(), BootMode::Default, || {
            InputSnapshot::with_buttons(Buttons::B1)
        });
        let control = serving(control.boot());

        assert_eq!(control.input_mode(), InputMode::Switch);
        assert_eq!(control.run_mode(), RunMode::Gamepad);
    }

    #[tokio::test(start_paused = true)]
    async fn matching_input_mode_is_not_saved_again() {
        let settings = PersistedSettings {
            forced_setup: ForcedSetupOptions::Unlocked,
            gamepad: GamepadOptions {
                input_mode: InputMode::Hid,
            },
        };
        let (control, _harness) = build(settings, BootMode::Default, || {
            InputSnapshot::with_buttons(Buttons::B3)
        });
        let mut control = serving(control.boot());
        assert_eq!(control.input_mode(), InputMode::Hid);

        control.drain_saves();
        assert_eq!(control.stats().saves_written, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn changed_input_mode_is_written_on_first_drain() {
        let (control, _harness) = build(PersistedSettings::default(), BootMode::Default, || {
            InputSnapshot::with_buttons(Buttons::R2)
        });
        let mut control = serving(control.boot());
        assert_eq!(control.input_mode(), InputMode::Keyboard);

        control.drain_saves();
        assert_eq!(control.stats().saves_written, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn locked_web_config_ignores_boot_combo() {
        let settings = PersistedSettings {
            forced_setup: ForcedSetupOptions::LockWebConfig,
            ..PersistedSettings::default()
        };
        let (control, _harness) = build(settings, BootMode::Default, || {
            InputSnapshot::with_buttons(Buttons::S2)
        });
        assert_eq!(serving(control.boot()).run_mode(), RunMode::Gamepad);
    }

    #[tokio::test(start_paused = true)]
    async fn addons_are_registered_in_order_after_boot() {
        let (mut control, _harness) =
            build(PersistedSettings::default(), BootMode::Gamepad, idle);
        control.register_addon(tagger("first", Buttons::A1), PhaseSet::PRE);
        control.register_addon(
            Box::new(Tagger {
                name: "disabled",
                bit: Buttons::A2,
                enabled: false,
                fail_setup: false,
            }),
            PhaseSet::PRE,
        );
        control.register_addon(
            Box::new(Tagger {
                name: "broken",
                bit: Buttons::L3,
                enabled: true,
                fail_setup: true,
            }),
            PhaseSet::PRE,
        );
        control.register_addon(tagger("second", Buttons::R3), PhaseSet::PRE);

        let mut control = serving(control.boot());
        assert_eq!(
            control.active_addons(),
            vec!["first".to_string(), "second".to_string()]
        );
        assert!(matches!(
            control.register_addon(tagger("late", Buttons::B1), PhaseSet::PRE),
            Err(ControlLoopError::RegistrationClosed)
        ));

        let reader = control.subscribe();
        assert!(control.tick(Instant::now()).is_none());
        let published = reader.read_latest_processed_state();
        assert_eq!(published.tick, 1);
        assert_eq!(published.input.buttons, Buttons::A1 | Buttons::R3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_reuses_previous_sample() {
        let mut calls = 0;
        let reader = move || -> Result<InputSnapshot, InputError> {
            calls += 1;
            if calls == 1 {
                Ok(InputSnapshot::with_buttons(Buttons::B2))
            } else {
                Err(InputError::ReadError("bus glitch".into()))
            }
        };

        struct Flaky<F>(F);
        impl<F: FnMut() -> Result<InputSnapshot, InputError>> InputReader for Flaky<F> {
            fn read_raw_input(&mut self) -> Result<InputSnapshot, InputError> {
                (self.0)()
            }
        }

        let (control, _harness) =
            build(PersistedSettings::default(), BootMode::Gamepad, Flaky(reader));
        let mut control = serving(control.boot());
        let state = control.subscribe();

        let start = Instant::now();
        control.tick(start);
        control.tick(start + Duration::from_millis(10));
        assert_eq!(state.read_latest_processed_state().input.buttons, Buttons::B2);
        assert_eq!(control.stats().read_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn holding_web_config_combo_reboots_from_gamepad() {
        let combo = Buttons::S2 | Buttons::B3 | Buttons::B4;
        let (control, harness) = build(
            PersistedSettings::default(),
            BootMode::Gamepad,
            press_after(Duration::from_millis(100), combo),
        );
        let control = serving(control.boot());
        let mut state = control.subscribe();

        let started = Instant::now();
        let mode = control.run().await;

        assert_eq!(mode, BootMode::WebConfig);
        assert_eq!(harness.latch.take(), BootMode::WebConfig);
        assert!(started.elapsed() >= Duration::from_millis(4100));
        assert!(started.elapsed() < Duration::from_millis(4300));

        let last = state.read_if_changed().expect("ticks were published");
        assert_eq!(last.input.buttons, combo);
        assert!(last.tick > 4000);
    }

    #[tokio::test(start_paused = true)]
    async fn web_config_loop_polls_and_leaves_on_hotkey() {
        let (control, harness) = build(
            PersistedSettings::default(),
            BootMode::WebConfig,
            press_after(Duration::from_millis(100), Buttons::S2 | Buttons::B3 | Buttons::B4),
        );
        let control = serving(control.boot());
        assert_eq!(control.run_mode(), RunMode::WebConfig);
        let state = control.subscribe();

        let mode = control.run().await;
        assert_eq!(mode, BootMode::Gamepad);
        assert_eq!(harness.latch.take(), BootMode::Gamepad);
        assert!(harness.polls.get() > 4000);
        // Nothing is published outside gamepad mode
        assert_eq!(state.read_latest_processed_state().tick, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bootsel_combo_requests_usb() {
        let (control, harness) = build(
            PersistedSettings::default(),
            BootMode::Gamepad,
            press_after(Duration::from_millis(100), Buttons::S1 | Buttons::B3 | Buttons::B4),
        );
        let mode = serving(control.boot()).run().await;
        assert_eq!(mode, BootMode::Usb);
        assert_eq!(harness.latch.peek(), BootMode::Usb);
    }

    #[tokio::test(start_paused = true)]
    async fn published_ticks_are_monotonic() {
        let (control, _harness) = build(PersistedSettings::default(), BootMode::Gamepad, idle);
        let mut control = serving(control.boot());
        let mut reader = control.subscribe();

        let start = Instant::now();
        let mut last = 0;
        for i in 0..50u64 {
            assert!(control.tick(start + Duration::from_millis(i)).is_none());
            let state = reader.read_if_changed().expect("published");
            assert!(state.tick > last);
            last = state.tick;
        }
        assert_eq!(control.stats().ticks, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_advances_from_the_previous_deadline() {
        let period = Duration::from_millis(1);
        let base = Instant::now();

        let (next, skipped) = next_tick_after(base, period, base + Duration::from_micros(300));
        assert_eq!(next, base + period);
        assert_eq!(skipped, 0);

        // Exactly on the next deadline runs it without skipping
        let (next, skipped) = next_tick_after(base, period, base + period);
        assert_eq!(next, base + period);
        assert_eq!(skipped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_skips_whole_missed_periods() {
        let period = Duration::from_millis(1);
        let base = Instant::now();

        let (next, skipped) = next_tick_after(base, period, base + Duration::from_micros(3500));
        assert_eq!(skipped, 3);
        assert_eq!(next, base + Duration::from_millis(4));
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_counts_more_than_u32_missed_periods() {
        let period = Duration::from_micros(1);
        let base = Instant::now();
        let now = base + Duration::from_secs(5_000);

        let (next, skipped) = next_tick_after(base, period, now);
        assert_eq!(skipped, 5_000_000_000);
        assert!(skipped > u64::from(u32::MAX));
        assert_eq!(next, now + period);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_log_once_per_interval() {
        let start = Instant::now();
        let mut stats = LoopStats::new(Duration::from_secs(30), start);

        assert!(!stats.maybe_log(start + Duration::from_secs(10)));
        assert!(stats.maybe_log(start + Duration::from_secs(30)));
        assert!(!stats.maybe_log(start + Duration::from_secs(31)));
        assert!(stats.maybe_log(start + Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_retried_while_ticking_continues() {
        let latch = BootModeLatch::new();
        let written = Rc::new(RefCell::new(Vec::new()));
        let storage = Box::new(FlakyStorage {
            queue: SaveQueue::new(4),
            failures: 1,
            written: written.clone(),
        });
        let input = || InputSnapshot::with_buttons(Buttons::B1);
        let collaborators = collaborators(storage, &latch, input, Rc::default());
        let control =
            ControlLoop::create(CoreConfig::default(), collaborators).expect("valid config");
        let mut control = serving(control.boot());
        assert_eq!(control.input_mode(), InputMode::Switch);

        control.drain_saves();
        assert_eq!(control.stats().save_failures, 1);
        assert_eq!(control.stats().saves_written, 0);
        assert!(control.stats().save_failing);
        assert!(written.borrow().is_empty());

        let reader = control.subscribe();
        assert!(control.tick(Instant::now()).is_none());
        assert_eq!(reader.read_latest_processed_state().tick, 1);

        control.drain_saves();
        assert_eq!(control.stats().save_failures, 1);
        assert_eq!(control.stats().saves_written, 1);
        assert!(!control.stats().save_failing);
        assert_eq!(
            *written.borrow(),
            vec![SettingsDelta::InputMode(InputMode::Switch)]
        );
    }
}
