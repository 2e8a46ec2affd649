//! Shared process types.

use std::path::PathBuf;

/// One row of a process snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Executable name as reported by the OS (may carry an extension).
    pub name: String,
    pub pid: u32,
    /// Whether the process owns a visible top-level window.
    pub has_visible_window: bool,
}

/// Errors launching a process.
#[derive(Debug)]
pub enum LaunchError {
    /// The executable does not exist at the expected path.
    Missing(PathBuf),
    /// The OS rejected the launch (elevation denied, spawn failure).
    Spawn(String),
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Missing(path) => write!(f, "Executable not found: {}", path.display()),
            LaunchError::Spawn(e) => write!(f, "Launch failed: {e}"),
        }
    }
}

impl std::error::Error for LaunchError {}
