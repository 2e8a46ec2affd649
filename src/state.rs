//! Lockdown state machine and the controller's owning loop.
//!
//! All lockdown state lives behind one thread: the controller loop pumps a
//! command channel and runs a periodic tick, strictly serialized — a tick
//! always completes before the next command or tick is handled. Every other
//! context (the remote handler, the key-filter hook) submits
//! [`StateCommand`] messages instead of mutating state directly. A small
//! atomic mirror exposes the active flag read-only to the remote thread.

use crate::config::{Mode, Settings, SettingsStore};
use crate::enforcer;
use crate::kiosk::{Kiosk, SurfaceFactory};
use crate::logging::SharedLogger;
use crate::procs::{self, LaunchError, ProcessTable};
use crate::{exe_name, SENTRY_PROCESS_NAME};
use chrono::{Local, NaiveTime};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval between state-machine ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(15);

/// Mutation requests accepted by the owning loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateCommand {
    /// Force lockdown on. `manual` marks a remote override.
    StartLockdown { manual: bool },
    /// Force lockdown off. `manual` marks a remote override.
    StopLockdown { manual: bool },
    /// A completed unlock sequence asks the surface to close.
    RequestUnlock,
    /// Re-read the settings file after a remote mutation.
    ReloadSettings,
    /// Leave the controller loop.
    Shutdown,
}

/// Read-only view of the owning loop's state for other threads. Written
/// only by the controller loop.
#[derive(Debug, Default)]
pub struct StatusMirror {
    active: AtomicBool,
}

impl StatusMirror {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

/// Evaluate the restriction window, handling windows that cross midnight.
/// The start boundary is inclusive, the end boundary exclusive.
pub fn should_be_active(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start > end {
        now >= start || now < end
    } else {
        start <= now && now < end
    }
}

/// The controller: owns the lockdown state, the kiosk, and the tick.
pub struct Controller {
    root: PathBuf,
    store: SettingsStore,
    settings: Settings,
    active: bool,
    manual_override: bool,
    kiosk: Option<Kiosk>,
    table: ProcessTable,
    logger: SharedLogger,
    mirror: Arc<StatusMirror>,
    cmd_rx: Receiver<StateCommand>,
    surface_factory: SurfaceFactory,
    sentry_supervision: bool,
}

impl Controller {
    pub fn new(
        root: PathBuf,
        logger: SharedLogger,
        cmd_rx: Receiver<StateCommand>,
        surface_factory: SurfaceFactory,
    ) -> Self {
        let store = SettingsStore::new(&root);
        let settings = store.load().unwrap_or_else(|e| {
            logger.log(&format!("Failed to read settings: {e}. Using defaults."));
            Settings::default()
        });
        Self {
            root,
            store,
            settings,
            active: false,
            manual_override: false,
            kiosk: None,
            table: ProcessTable::new(),
            logger,
            mirror: Arc::new(StatusMirror::default()),
            cmd_rx,
            surface_factory,
            sentry_supervision: true,
        }
    }

    /// Shared read-only status view for other threads.
    pub fn mirror(&self) -> Arc<StatusMirror> {
        self.mirror.clone()
    }

    /// Enable or disable relaunching a missing sentry from the tick.
    pub fn set_sentry_supervision(&mut self, on: bool) {
        self.sentry_supervision = on;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn manual_override(&self) -> bool {
        self.manual_override
    }

    /// Run until a `Shutdown` command arrives. Ticks and commands are
    /// strictly serialized on this thread.
    pub fn run(&mut self) {
        // The first tick fires immediately at process start.
        let mut last_tick: Option<Instant> = None;
        loop {
            let due = last_tick
                .map(|t| t.elapsed() >= TICK_INTERVAL)
                .unwrap_or(true);
            if due {
                self.tick();
                last_tick = Some(Instant::now());
            }
            match self.cmd_rx.recv_timeout(Duration::from_millis(250)) {
                Ok(StateCommand::Shutdown) => {
                    self.logger.log("Controller loop shutting down.");
                    break;
                }
                Ok(command) => self.apply(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.pump_kiosk();
        }
    }

    /// Apply one mutation request on the owning thread.
    pub fn apply(&mut self, command: StateCommand) {
        match command {
            StateCommand::StartLockdown { manual } => {
                if manual {
                    self.manual_override = true;
                }
                self.start_lockdown();
            }
            StateCommand::StopLockdown { manual } => {
                if manual {
                    self.manual_override = true;
                }
                self.stop_lockdown();
            }
            StateCommand::RequestUnlock => {
                if let Some(kiosk) = self.kiosk.as_mut() {
                    kiosk.unlock_and_close();
                }
                self.reap_closed_kiosk();
            }
            StateCommand::ReloadSettings => match self.store.load() {
                Ok(settings) => self.settings = settings,
                Err(e) => self.logger.log(&format!("Failed to reload settings: {e}")),
            },
            StateCommand::Shutdown => {}
        }
    }

    /// Run one tick against the wall clock.
    pub fn tick(&mut self) {
        self.tick_at(Local::now().time());
    }

    /// Run one tick as of the given time of day.
    pub fn tick_at(&mut self, now: NaiveTime) {
        if self.sentry_supervision {
            self.ensure_sentry_running();
        }

        if self.active {
            enforcer::enforce(&mut self.table, self.settings.mode, &self.logger);
        }

        // Remote control owns the state entirely until the override clears.
        if self.manual_override {
            return;
        }

        if self.settings.mode == Mode::Debug {
            if !self.active {
                self.start_lockdown();
            }
            return;
        }

        let should =
            should_be_active(now, self.settings.start_time, self.settings.end_time);
        if should && !self.active {
            self.start_lockdown();
        } else if !should && self.active {
            self.stop_lockdown();
        }
    }

    /// Relay kiosk events and observe surface lifecycle. Called from the
    /// owning loop between commands.
    pub fn pump_kiosk(&mut self) {
        let unlock_requested = match self.kiosk.as_mut() {
            Some(kiosk) => kiosk.pump(),
            None => false,
        };
        if unlock_requested {
            self.apply(StateCommand::RequestUnlock);
        }
        self.reap_closed_kiosk();
    }

    fn start_lockdown(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.mirror.set_active(true);
        self.logger.log("Starting lockdown.");

        enforcer::enforce(&mut self.table, self.settings.mode, &self.logger);

        match Kiosk::open(
            self.settings.mode,
            &self.settings.links,
            &self.logger,
            self.surface_factory.as_ref(),
        ) {
            Ok(kiosk) => self.kiosk = Some(kiosk),
            Err(e) => {
                // Enforcement still runs every tick; only the surface is
                // missing until the next transition.
                self.logger.log(&format!("Failed to open locked surface: {e}"));
            }
        }
    }

    fn stop_lockdown(&mut self) {
        match self.kiosk.as_mut() {
            Some(kiosk) => {
                self.logger.log("Stopping lockdown.");
                kiosk.unlock_and_close();
                self.reap_closed_kiosk();
            }
            None => {
                // Flag and surface lifecycle got out of sync; self-heal.
                self.active = false;
                self.mirror.set_active(false);
                self.logger
                    .log("Stop requested with no active surface. Resetting flag.");
            }
        }
    }

    fn reap_closed_kiosk(&mut self) {
        if self.kiosk.as_ref().map(Kiosk::is_closed).unwrap_or(false) {
            self.kiosk = None;
            self.active = false;
            self.mirror.set_active(false);
            self.logger.log("Locked surface closed, lockdown ended.");
        }
    }

    fn ensure_sentry_running(&mut self) {
        if self.table.is_running(SENTRY_PROCESS_NAME) {
            return;
        }
        let sentry = self.root.join(exe_name(SENTRY_PROCESS_NAME));
        let root_arg = self.root.to_string_lossy().to_string();
        match procs::launch(&sentry, &self.root, &[root_arg], true) {
            Ok(()) => self.logger.log("Sentry process was not running. Started it."),
            Err(LaunchError::Missing(path)) => self
                .logger
                .critical(&format!("Sentry executable not found at {}", path.display())),
            Err(e) => self.logger.log(&format!("Failed to launch sentry: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kiosk::{ContentSurface, HeadlessSurface};
    use crate::logging::create_shared_logger;
    use crossbeam_channel::bounded;
    use std::sync::atomic::AtomicUsize;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_window_same_day() {
        let start = time(9, 0);
        let end = time(17, 0);
        assert!(!should_be_active(time(8, 59), start, end));
        assert!(should_be_active(time(9, 0), start, end)); // start inclusive
        assert!(should_be_active(time(12, 0), start, end));
        assert!(!should_be_active(time(17, 0), start, end)); // end exclusive
        assert!(!should_be_active(time(23, 0), start, end));
    }

    #[test]
    fn test_window_crossing_midnight() {
        let start = time(22, 0);
        let end = time(7, 0);
        assert!(!should_be_active(time(21, 59), start, end));
        assert!(should_be_active(time(22, 0), start, end));
        assert!(should_be_active(time(23, 30), start, end));
        assert!(should_be_active(time(0, 0), start, end));
        assert!(should_be_active(time(6, 59), start, end));
        assert!(!should_be_active(time(7, 0), start, end));
        assert!(!should_be_active(time(12, 0), start, end));
    }

    #[test]
    fn test_window_degenerate_equal_bounds() {
        let at = time(10, 0);
        assert!(!should_be_active(time(10, 0), at, at));
        assert!(!should_be_active(time(11, 0), at, at));
    }

    fn controller_with_settings(content: &str) -> (tempfile::TempDir, Controller, Arc<AtomicUsize>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(crate::config::SETTINGS_FILE), content).unwrap();
        let logger = create_shared_logger(dir.path().join("log.txt"));
        let (_tx, rx) = bounded(8);
        let surfaces_created = Arc::new(AtomicUsize::new(0));
        let counter = surfaces_created.clone();
        let factory: SurfaceFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(HeadlessSurface::new()) as Box<dyn ContentSurface>
        });
        let mut controller = Controller::new(dir.path().to_path_buf(), logger, rx, factory);
        controller.set_sentry_supervision(false);
        (dir, controller, surfaces_created)
    }

    #[test]
    fn test_tick_transitions_with_schedule() {
        let (_dir, mut controller, _surfaces) =
            controller_with_settings("mode=live\nstartTime=22:00\nendTime=07:00\n");

        controller.tick_at(time(21, 0));
        assert!(!controller.is_active());

        controller.tick_at(time(23, 30));
        assert!(controller.is_active());
        assert!(controller.mirror().is_active());

        controller.tick_at(time(7, 30));
        assert!(!controller.is_active());
        assert!(!controller.mirror().is_active());
    }

    #[test]
    fn test_start_lockdown_is_idempotent() {
        let (_dir, mut controller, surfaces) =
            controller_with_settings("mode=live\nstartTime=22:00\nendTime=07:00\n");

        controller.apply(StateCommand::StartLockdown { manual: true });
        controller.apply(StateCommand::StartLockdown { manual: true });
        assert!(controller.is_active());
        assert_eq!(surfaces.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_mode_forces_active() {
        let (_dir, mut controller, _surfaces) =
            controller_with_settings("mode=debug\nstartTime=22:00\nendTime=07:00\n");

        controller.tick_at(time(12, 0)); // outside the window
        assert!(controller.is_active());
    }

    #[test]
    fn test_manual_stop_holds_through_ticks() {
        let (_dir, mut controller, _surfaces) =
            controller_with_settings("mode=live\nstartTime=22:00\nendTime=07:00\n");

        controller.tick_at(time(23, 30));
        assert!(controller.is_active());

        controller.apply(StateCommand::StopLockdown { manual: true });
        assert!(!controller.is_active());
        assert!(controller.manual_override());

        // Still inside the window, but the override keeps the schedule inert.
        controller.tick_at(time(23, 31));
        assert!(!controller.is_active());
    }

    #[test]
    fn test_stop_without_surface_self_heals() {
        let (_dir, mut controller, _surfaces) =
            controller_with_settings("mode=live\nstartTime=22:00\nendTime=07:00\n");

        controller.apply(StateCommand::StopLockdown { manual: false });
        assert!(!controller.is_active());
    }

    #[test]
    fn test_unlock_request_closes_surface_and_deactivates() {
        let (_dir, mut controller, _surfaces) =
            controller_with_settings("mode=live\nstartTime=22:00\nendTime=07:00\n");

        controller.tick_at(time(23, 30));
        assert!(controller.is_active());

        controller.apply(StateCommand::RequestUnlock);
        assert!(!controller.is_active());
        assert!(!controller.mirror().is_active());
    }

    #[test]
    fn test_reload_settings_picks_up_mode_change() {
        let (dir, mut controller, _surfaces) =
            controller_with_settings("mode=live\nstartTime=22:00\nendTime=07:00\n");

        std::fs::write(
            dir.path().join(crate::config::SETTINGS_FILE),
            "mode=debug\nstartTime=22:00\nendTime=07:00\n",
        )
        .unwrap();
        controller.apply(StateCommand::ReloadSettings);

        controller.tick_at(time(12, 0));
        assert!(controller.is_active());
    }
}
