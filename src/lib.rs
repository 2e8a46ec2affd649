//! Curfew Agent - time-windowed access restriction for a single machine.
//!
//! During configured hours the agent blocks interactive use of all but a
//! small set of allowed processes and presents a locked-down full-screen
//! surface. A companion sentry process resurrects the agent and its
//! autostart registration, and an operator drives everything remotely over
//! a messaging channel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        curfew-agent                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐    ┌─────────────┐    ┌──────────────┐        │
//! │  │  Remote   │──▶│  Controller  │──▶│   Enforcer    │        │
//! │  │  handler  │    │ (owning loop)│    │ (whitelist)  │        │
//! │  └───────────┘    └──────┬──────┘    └──────────────┘        │
//! │        │                 ▼                                   │
//! │        ▼          ┌─────────────┐    ┌──────────────┐        │
//! │  ┌───────────┐    │    Kiosk    │◀──│  Key filter   │        │
//! │  │  Updater  │    │  (surface)  │    │  (hook)      │        │
//! │  └───────────┘    └─────────────┘    └──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────────────────────────────────────────┐
//! │  curfew-sentry: relaunch agent + recreate autostart, forever │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All lockdown state is owned by the controller loop; the remote handler
//! and the key-filter hook submit [`state::StateCommand`] messages instead
//! of mutating anything directly.

pub mod autostart;
pub mod config;
pub mod enforcer;
pub mod keyhook;
pub mod kiosk;
pub mod logging;
pub mod procs;
pub mod remote;
pub mod state;
pub mod updater;
pub mod watchdog;

// Re-export key types at crate root for convenience
pub use config::{Mode, Settings, SettingsStore};
pub use kiosk::{ContentSurface, HeadlessSurface, Kiosk};
pub use logging::{FileLogger, SharedLogger};
pub use remote::{RemoteCommand, RemoteHandler};
pub use state::{should_be_active, Controller, StateCommand, StatusMirror};
pub use watchdog::Watchdog;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process name of the controller binary.
pub const AGENT_PROCESS_NAME: &str = "curfew-agent";

/// Process name of the watchdog binary.
pub const SENTRY_PROCESS_NAME: &str = "curfew-sentry";

/// File name of a binary on the target platform.
pub fn exe_name(base: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

/// The application root: the directory holding the running executable,
/// falling back to the current directory.
pub fn app_root() -> std::path::PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}
