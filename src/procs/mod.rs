//! Process table access and process control.
//!
//! Snapshots come from `sysinfo` and are taken fresh on every call —
//! processes appear and disappear between enforcement passes, so nothing
//! here is cached. The visible-window query and the elevated launcher are
//! platform-specific; non-Windows builds get noop fallbacks so the crate
//! compiles and tests anywhere.

pub mod types;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod noop;

pub use types::{LaunchError, ProcessInfo};

#[cfg(target_os = "windows")]
use windows as platform;

#[cfg(not(target_os = "windows"))]
use noop as platform;

use std::path::Path;
use sysinfo::System;

/// Case-insensitive process-name key with any `.exe` suffix stripped.
pub fn normalized_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    lower.strip_suffix(".exe").unwrap_or(&lower).to_string()
}

/// Live view of the OS process table.
pub struct ProcessTable {
    sys: System,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }

    /// Take a fresh snapshot of all processes, marking those that own a
    /// visible top-level window.
    pub fn snapshot(&mut self) -> Vec<ProcessInfo> {
        self.sys.refresh_processes();
        let visible = platform::visible_window_pids();
        self.sys
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                name: process.name().to_string(),
                pid: pid.as_u32(),
                has_visible_window: visible.contains(&pid.as_u32()),
            })
            .collect()
    }

    /// Whether any process with the given name (extension ignored) exists.
    pub fn is_running(&mut self, name: &str) -> bool {
        self.sys.refresh_processes();
        let wanted = normalized_name(name);
        self.sys
            .processes()
            .values()
            .any(|p| normalized_name(p.name()) == wanted)
    }

    /// Terminate every process with the given name. Returns how many kill
    /// requests were issued; per-process failures are ignored.
    pub fn kill_by_name(&mut self, name: &str) -> usize {
        self.sys.refresh_processes();
        let wanted = normalized_name(name);
        let mut killed = 0;
        for process in self.sys.processes().values() {
            if normalized_name(process.name()) == wanted && process.kill() {
                killed += 1;
            }
        }
        killed
    }

    /// Terminate a single process by pid. Returns false when the process is
    /// already gone or access is denied.
    pub fn kill_pid(&mut self, pid: u32) -> bool {
        self.sys.refresh_processes();
        self.sys
            .process(sysinfo::Pid::from_u32(pid))
            .map(|p| p.kill())
            .unwrap_or(false)
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch an executable with the given working directory, optionally
/// elevated. The executable must exist.
pub fn launch(
    executable: &Path,
    workdir: &Path,
    args: &[String],
    elevated: bool,
) -> Result<(), LaunchError> {
    if !executable.exists() {
        return Err(LaunchError::Missing(executable.to_path_buf()));
    }
    platform::launch(executable, workdir, args, elevated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_name_strips_extension_and_case() {
        assert_eq!(normalized_name("Explorer.EXE"), "explorer");
        assert_eq!(normalized_name("curfew-agent"), "curfew-agent");
        assert_eq!(normalized_name("svchost.exe"), "svchost");
    }

    #[test]
    fn test_snapshot_lists_current_process() {
        let mut table = ProcessTable::new();
        let snapshot = table.snapshot();
        assert!(!snapshot.is_empty());
        let own_pid = std::process::id();
        assert!(snapshot.iter().any(|p| p.pid == own_pid));
    }

    #[test]
    fn test_launch_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-here");
        match launch(&missing, dir.path(), &[], false) {
            Err(LaunchError::Missing(path)) => assert_eq!(path, missing),
            other => panic!("expected Missing, got {other:?}"),
        }
    }
}
