//! End-to-end controller flow: schedule transitions and remote overrides.

use chrono::NaiveTime;
use crossbeam_channel::bounded;
use curfew_agent::config::SETTINGS_FILE;
use curfew_agent::kiosk::{ContentSurface, HeadlessSurface};
use curfew_agent::logging::create_shared_logger;
use curfew_agent::state::{Controller, StateCommand};

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn controller(dir: &tempfile::TempDir, settings: &str) -> Controller {
    std::fs::write(dir.path().join(SETTINGS_FILE), settings).unwrap();
    let logger = create_shared_logger(dir.path().join("log.txt"));
    let (_tx, rx) = bounded(8);
    let factory = Box::new(|| Box::new(HeadlessSurface::new()) as Box<dyn ContentSurface>);
    let mut controller = Controller::new(dir.path().to_path_buf(), logger, rx, factory);
    controller.set_sentry_supervision(false);
    controller
}

#[test]
fn night_window_with_remote_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(&dir, "mode=live\nstartTime=22:00\nendTime=07:00\n");

    // Inside the window a tick activates the lockdown.
    controller.tick_at(time(23, 30));
    assert!(controller.is_active());
    assert!(controller.mirror().is_active());

    // stop_lock forces Inactive regardless of the clock and takes manual
    // control of the state.
    controller.apply(StateCommand::StopLockdown { manual: true });
    assert!(!controller.is_active());
    assert!(controller.manual_override());

    // Subsequent ticks inside the window do not re-activate while the
    // override holds.
    controller.tick_at(time(23, 45));
    controller.tick_at(time(2, 0));
    assert!(!controller.is_active());

    // start_lock forces Active even outside the window.
    controller.apply(StateCommand::StartLockdown { manual: true });
    assert!(controller.is_active());
    controller.tick_at(time(12, 0));
    assert!(controller.is_active());
}

#[test]
fn schedule_deactivates_after_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(&dir, "mode=live\nstartTime=22:00\nendTime=07:00\n");

    controller.tick_at(time(22, 0));
    assert!(controller.is_active());

    // End boundary is exclusive: at 07:00 the lockdown lifts.
    controller.tick_at(time(7, 0));
    assert!(!controller.is_active());
    assert!(!controller.mirror().is_active());
}

#[test]
fn unlock_request_ends_lockdown_until_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(&dir, "mode=live\nstartTime=22:00\nendTime=07:00\n");

    controller.tick_at(time(23, 0));
    assert!(controller.is_active());

    // A completed unlock sequence closes the surface and deactivates.
    controller.apply(StateCommand::RequestUnlock);
    assert!(!controller.is_active());

    // Without an override, the schedule re-activates on the next tick.
    controller.tick_at(time(23, 1));
    assert!(controller.is_active());
}
