//! Non-Windows (noop) key filter.
//!
//! Exists so the crate compiles and tests on hosts without the Windows
//! hook API. No events are intercepted; the unlock channel simply never
//! fires.

use crossbeam_channel::{bounded, Receiver, Sender};

/// Errors installing the keyboard filter.
#[derive(Debug)]
pub enum HookError {
    AlreadyInstalled,
    InstallFailed,
}

impl std::fmt::Display for HookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookError::AlreadyInstalled => write!(f, "Key filter is already installed"),
            HookError::InstallFailed => write!(f, "Failed to install keyboard hook"),
        }
    }
}

impl std::error::Error for HookError {}

/// A key filter that intercepts nothing.
pub struct KeyFilter {
    _unlock_tx: Sender<()>,
    unlock_rx: Receiver<()>,
}

impl KeyFilter {
    pub fn install() -> Result<Self, HookError> {
        let (unlock_tx, unlock_rx) = bounded(4);
        Ok(Self {
            _unlock_tx: unlock_tx,
            unlock_rx,
        })
    }

    /// Channel carrying one message per completed unlock sequence. Never
    /// fires on this platform.
    pub fn unlock_requests(&self) -> &Receiver<()> {
        &self.unlock_rx
    }

    pub fn uninstall(&mut self) {}
}
