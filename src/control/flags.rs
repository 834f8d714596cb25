//! Cooperative stop/pause flags
//!
//! Checked once per polling tick; an in-flight action completes before a
//! flag is observed. A hotkey handler (or any other thread) owns a clone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop/pause state for one automation run.
#[derive(Debug, Clone, Default)]
pub struct ControlFlags {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop. Observed at the next tick boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Toggle the pause flag, returning the new state.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.pause.load(Ordering::SeqCst);
        self.pause.store(paused, Ordering::SeqCst);
        paused
    }

    pub fn paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }
}
