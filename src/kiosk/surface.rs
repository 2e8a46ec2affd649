//! Interface to the embedded browser surface.
//!
//! The real full-screen browser is an external collaborator: it consumes an
//! HTML document string and produces one string message per user selection.
//! Everything the agent needs from it is captured by [`ContentSurface`].
//! [`HeadlessSurface`] is the built-in stand-in used when no embedded
//! browser is linked in, and the workhorse of the tests.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Errors raised by a surface implementation.
#[derive(Debug)]
pub enum SurfaceError {
    Init(String),
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::Init(e) => write!(f, "Surface initialization failed: {e}"),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// The call contract of the embedded browser surface.
pub trait ContentSurface: Send {
    /// Render the given HTML document.
    fn show(&mut self, html: &str) -> Result<(), SurfaceError>;

    /// Take the next pending "item selected" message, when one arrived.
    fn try_take_selection(&mut self) -> Option<String>;

    /// Destroy the surface.
    fn close(&mut self);
}

/// Factory producing a fresh surface per lockdown.
pub type SurfaceFactory = Box<dyn Fn() -> Box<dyn ContentSurface> + Send>;

/// A surface with no display. Records what it was asked to render and lets
/// a [`SurfaceProbe`] inject user selections.
pub struct HeadlessSurface {
    selection_tx: Sender<String>,
    selection_rx: Receiver<String>,
    shown: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        let (selection_tx, selection_rx) = unbounded();
        Self {
            selection_tx,
            selection_rx,
            shown: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Observation handle that stays valid after the surface is boxed away.
    pub fn probe(&self) -> SurfaceProbe {
        SurfaceProbe {
            selections: self.selection_tx.clone(),
            shown: self.shown.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSurface for HeadlessSurface {
    fn show(&mut self, html: &str) -> Result<(), SurfaceError> {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(html.to_string());
        }
        Ok(())
    }

    fn try_take_selection(&mut self) -> Option<String> {
        self.selection_rx.try_recv().ok()
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Probe into a [`HeadlessSurface`]: inject selections, inspect renders.
#[derive(Clone)]
pub struct SurfaceProbe {
    pub selections: Sender<String>,
    pub shown: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl SurfaceProbe {
    pub fn last_shown(&self) -> Option<String> {
        self.shown.lock().ok().and_then(|s| s.last().cloned())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
