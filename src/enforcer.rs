//! Process whitelist enforcement.
//!
//! During lockdown, every process that owns a visible top-level window and
//! is not on the allow-list gets terminated. Planning is separated from
//! execution so the decision logic can be tested against synthetic
//! snapshots. Enforcement is best-effort: per-process failures (already
//! exited, access denied) are ignored and the pass continues.

use crate::config::Mode;
use crate::logging::SharedLogger;
use crate::procs::{normalized_name, ProcessInfo, ProcessTable};
use crate::{AGENT_PROCESS_NAME, SENTRY_PROCESS_NAME};
use std::collections::HashSet;

/// OS-critical processes that must never be terminated.
pub const SYSTEM_ALLOWLIST: [&str; 11] = [
    "explorer",
    "svchost",
    "lsass",
    "winlogon",
    "csrss",
    "smss",
    "wininit",
    "services",
    "dwm",
    "taskhostw",
    "fontdrvhost",
];

/// Full allow-list: system processes plus this system's own two binaries.
pub fn allowlist() -> HashSet<String> {
    let mut allowed: HashSet<String> = SYSTEM_ALLOWLIST
        .iter()
        .map(|name| normalized_name(name))
        .collect();
    allowed.insert(normalized_name(AGENT_PROCESS_NAME));
    allowed.insert(normalized_name(SENTRY_PROCESS_NAME));
    allowed
}

/// Select the processes a lockdown pass would terminate: visible top-level
/// window, name not on the allow-list.
pub fn plan_terminations<'a>(
    snapshot: &'a [ProcessInfo],
    allowed: &HashSet<String>,
) -> Vec<&'a ProcessInfo> {
    snapshot
        .iter()
        .filter(|p| p.has_visible_window && !allowed.contains(&normalized_name(&p.name)))
        .collect()
}

/// Apply a plan. In `test` mode the intended terminations are logged only.
pub fn execute_plan(
    table: &mut ProcessTable,
    plan: &[&ProcessInfo],
    mode: Mode,
    logger: &SharedLogger,
) {
    for target in plan {
        if mode == Mode::Test {
            logger.log(&format!(
                "[TEST MODE] Would have terminated process: {} (pid {})",
                target.name, target.pid
            ));
        } else if table.kill_pid(target.pid) {
            logger.log(&format!(
                "Terminated unauthorized process: {} (pid {})",
                target.name, target.pid
            ));
        }
    }
}

/// Run one full enforcement pass against the live process table.
pub fn enforce(table: &mut ProcessTable, mode: Mode, logger: &SharedLogger) {
    let snapshot = table.snapshot();
    let allowed = allowlist();
    let plan = plan_terminations(&snapshot, &allowed);
    execute_plan(table, &plan, mode, logger);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::create_shared_logger;

    fn proc(name: &str, pid: u32, visible: bool) -> ProcessInfo {
        ProcessInfo {
            name: name.to_string(),
            pid,
            has_visible_window: visible,
        }
    }

    #[test]
    fn test_plan_skips_allowlisted_and_windowless() {
        let snapshot = vec![
            proc("explorer.exe", 10, true),
            proc("svchost.exe", 11, false),
            proc("game.exe", 12, true),
            proc("background-updater.exe", 13, false),
            proc(AGENT_PROCESS_NAME, 14, true),
            proc(SENTRY_PROCESS_NAME, 15, false),
        ];
        let allowed = allowlist();
        let plan = plan_terminations(&snapshot, &allowed);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "game.exe");
    }

    #[test]
    fn test_plan_matching_is_case_insensitive() {
        let snapshot = vec![proc("EXPLORER.EXE", 1, true), proc("Browser.exe", 2, true)];
        let allowed = allowlist();
        let plan = plan_terminations(&snapshot, &allowed);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "Browser.exe");
    }

    #[test]
    fn test_empty_snapshot_plans_nothing() {
        let allowed = allowlist();
        assert!(plan_terminations(&[], &allowed).is_empty());
    }

    #[test]
    fn test_test_mode_logs_without_killing() {
        let dir = tempfile::tempdir().unwrap();
        let logger = create_shared_logger(dir.path().join("log.txt"));
        let mut table = ProcessTable::new();

        let doomed = proc("game.exe", 999_999_999, true);
        execute_plan(&mut table, &[&doomed], Mode::Test, &logger);

        let content = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert!(content.contains("[TEST MODE] Would have terminated process: game.exe"));
    }

    #[test]
    fn test_live_mode_ignores_vanished_process() {
        let dir = tempfile::tempdir().unwrap();
        let logger = create_shared_logger(dir.path().join("log.txt"));
        let mut table = ProcessTable::new();

        // A pid that cannot exist: the kill fails and the pass continues.
        let ghost = proc("ghost.exe", 999_999_999, true);
        execute_plan(&mut table, &[&ghost], Mode::Live, &logger);
    }
}
