//! System-wide keyboard interception for the locked surface.
//!
//! The decision logic ([`filter::EscapeFilter`]) is platform-independent
//! and fully unit-tested; only the hook installation is Windows-specific,
//! with a noop fallback on other targets.

pub mod filter;
pub mod types;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod noop;

pub use filter::{EscapeFilter, UNLOCK_PASSPHRASE};
pub use types::{FilterVerdict, KeyEvent};

#[cfg(target_os = "windows")]
pub use windows::{HookError, KeyFilter};

#[cfg(not(target_os = "windows"))]
pub use noop::{HookError, KeyFilter};
