//! Non-Windows fallbacks for the platform-specific process operations.
//!
//! These exist so the crate (and both binaries) can compile and test on
//! non-Windows hosts. No window visibility is reported and launches happen
//! without elevation.

use crate::procs::types::LaunchError;
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

/// No visible-window information is available off Windows.
pub fn visible_window_pids() -> HashSet<u32> {
    HashSet::new()
}

/// Spawn the executable directly. The elevation flag is accepted but has no
/// effect here.
pub fn launch(
    executable: &Path,
    workdir: &Path,
    args: &[String],
    _elevated: bool,
) -> Result<(), LaunchError> {
    Command::new(executable)
        .args(args)
        .current_dir(workdir)
        .spawn()
        .map(|_| ())
        .map_err(|e| LaunchError::Spawn(e.to_string()))
}
