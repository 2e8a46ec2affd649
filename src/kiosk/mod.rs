//! The locked full-screen surface shown during lockdown.
//!
//! The kiosk owns the content surface and, outside debug mode, the
//! system-wide key filter. Close requests are suppressed until the internal
//! unlock flag is set (or the agent runs in debug mode); the unlock flag is
//! only ever set by the owning loop, either from a remote stop command or
//! from a completed unlock sequence relayed out of the hook context.

pub mod content;
pub mod surface;

pub use surface::{ContentSurface, HeadlessSurface, SurfaceError, SurfaceFactory, SurfaceProbe};

use crate::config::Mode;
use crate::keyhook::KeyFilter;
use crate::logging::SharedLogger;
use std::time::Duration;

/// Delay before the single retry of a failed surface initialization.
const SURFACE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// The active locked surface and its escape-blocking filter.
pub struct Kiosk {
    surface: Box<dyn ContentSurface>,
    key_filter: Option<KeyFilter>,
    mode: Mode,
    unlocked: bool,
    closed: bool,
}

impl Kiosk {
    /// Create the locked surface, render the home page, and install the key
    /// filter (skipped in debug mode). A failed surface initialization is
    /// retried once after a short delay.
    pub fn open(
        mode: Mode,
        links: &[String],
        logger: &SharedLogger,
        factory: &(dyn Fn() -> Box<dyn ContentSurface> + Send),
    ) -> Result<Self, SurfaceError> {
        let html = content::home_page(links);

        let mut surface = factory();
        if let Err(e) = surface.show(&html) {
            logger.log(&format!("Surface initialization failed: {e}. Retrying once..."));
            std::thread::sleep(SURFACE_RETRY_DELAY);
            surface = factory();
            surface.show(&html)?;
        }

        let key_filter = if mode != Mode::Debug {
            match KeyFilter::install() {
                Ok(filter) => Some(filter),
                Err(e) => {
                    logger.log(&format!(
                        "Failed to install key filter: {e}. Continuing without keyboard blocking."
                    ));
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            surface,
            key_filter,
            mode,
            unlocked: false,
            closed: false,
        })
    }

    /// Relay pending "item selected" messages into the detail view and
    /// report whether the key filter completed an unlock sequence.
    pub fn pump(&mut self) -> bool {
        while let Some(video_id) = self.surface.try_take_selection() {
            let _ = self.surface.show(&content::detail_page(&video_id));
        }
        self.key_filter
            .as_ref()
            .map(|f| f.unlock_requests().try_recv().is_ok())
            .unwrap_or(false)
    }

    /// Attempt to close the surface. Suppressed unless unlocked or in debug
    /// mode. Returns whether the surface actually closed.
    pub fn request_close(&mut self) -> bool {
        if self.closed {
            return true;
        }
        if !self.unlocked && self.mode != Mode::Debug {
            return false;
        }
        if let Some(mut filter) = self.key_filter.take() {
            filter.uninstall();
        }
        self.surface.close();
        self.closed = true;
        true
    }

    /// Set the unlock flag and close. Must be invoked from the owning loop.
    pub fn unlock_and_close(&mut self) {
        self.unlocked = true;
        self.request_close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
