//! Launcher visibility bootstrap
//!
//! The launcher likes to live minimized in the system tray. Direct lookup
//! plus restore/focus is tried first; the backend's tray-recovery heuristic
//! is the fallback, followed by a bounded re-check loop.

use std::time::{Duration, Instant};

use log::warn;

use crate::control::{sleep_ms, Desktop, WindowCache};

/// Make sure the launcher window is visible and focused.
pub fn ensure_launcher_visible(
    desktop: &mut Desktop,
    window: &mut WindowCache,
    timeout: Duration,
) -> bool {
    if let Some(id) = window.resolve(desktop.windows.as_mut()) {
        if desktop.windows.focus(id) {
            return true;
        }
    }

    if desktop.windows.recover_from_tray() {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            window.invalidate();
            if let Some(id) = window.resolve(desktop.windows.as_mut()) {
                if desktop.windows.focus(id) {
                    return true;
                }
            }
            sleep_ms(200);
        }
    }

    warn!("launcher window could not be made visible");
    false
}
