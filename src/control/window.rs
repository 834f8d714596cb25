//! Cached window handle
//!
//! Window title searches are slow enough to matter at the polling rate, so
//! the resolved handle is cached and re-validated on every use. The cache is
//! owned, injectable state - invalidate-and-refetch is a method here, not a
//! free function mutating globals.

use log::debug;

use super::{Rect, WindowControl, WindowId};

/// A lazily resolved, revalidated handle to one application window.
#[derive(Debug, Clone)]
pub struct WindowCache {
    title_fragments: Vec<String>,
    handle: Option<WindowId>,
}

impl WindowCache {
    pub fn new(title_fragments: Vec<String>) -> Self {
        Self {
            title_fragments,
            handle: None,
        }
    }

    /// Return a live handle, re-resolving it if the cached one went stale.
    pub fn resolve(&mut self, windows: &mut dyn WindowControl) -> Option<WindowId> {
        if let Some(id) = self.handle {
            if windows.is_valid(id) {
                return Some(id);
            }
            debug!("cached window handle {id} went stale, re-resolving");
            self.handle = None;
        }
        self.handle = windows.find_window(&self.title_fragments);
        self.handle
    }

    /// Drop the cached handle so the next resolve does a fresh lookup.
    pub fn invalidate(&mut self) {
        self.handle = None;
    }

    /// Resolve and focus in one step.
    pub fn focus(&mut self, windows: &mut dyn WindowControl) -> Option<WindowId> {
        let id = self.resolve(windows)?;
        if !windows.focus(id) {
            debug!("failed to focus window {id}");
        }
        Some(id)
    }

    /// Outer rectangle of the (re)resolved window.
    pub fn rect(&mut self, windows: &mut dyn WindowControl) -> Option<Rect> {
        let id = self.resolve(windows)?;
        windows.rect(id)
    }
}
