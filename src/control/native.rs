//! Native desktop backend
//!
//! Compiled behind the `desktop` cargo feature: `enigo` injects input,
//! `screenshots` captures regions, and window control talks to the Win32
//! API (the launcher and client are Windows applications). Other
//! platforms, and default builds, get `BackendUnavailable`.

use super::{ControlError, Desktop};

/// Build the native backend for this platform.
pub fn desktop() -> Result<Desktop, ControlError> {
    imp::desktop()
}

#[cfg(all(feature = "desktop", target_os = "windows"))]
mod imp {
    use image::RgbaImage;
    use log::{debug, warn};

    use crate::control::{
        sleep_ms, ControlError, Desktop, Input, Key, Point, Rect, Screen, WindowControl, WindowId,
    };

    use windows_sys::Win32::Foundation::{HWND, LPARAM, RECT};
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowRect, GetWindowTextW, IsIconic, IsWindow, IsWindowVisible,
        PostMessageW, SetForegroundWindow, ShowWindow, SW_RESTORE, SW_SHOW, WM_CLOSE,
    };

    pub fn desktop() -> Result<Desktop, ControlError> {
        let enigo = enigo::Enigo::new(&enigo::Settings::default())
            .map_err(|e| ControlError::Init(e.to_string()))?;
        Ok(Desktop::new(
            Box::new(WinWindows),
            Box::new(ScreenshotsScreen),
            Box::new(EnigoInput { enigo }),
        ))
    }

    struct EnigoInput {
        enigo: enigo::Enigo,
    }

    impl Input for EnigoInput {
        fn move_to(&mut self, p: Point) {
            use enigo::{Coordinate, Mouse};
            if let Err(e) = self.enigo.move_mouse(p.x, p.y, Coordinate::Abs) {
                debug!("move_mouse failed: {e}");
            }
        }

        fn click(&mut self, p: Point) {
            use enigo::{Button, Coordinate, Direction, Mouse};
            let _ = self.enigo.move_mouse(p.x, p.y, Coordinate::Abs);
            if let Err(e) = self.enigo.button(Button::Left, Direction::Click) {
                debug!("click failed: {e}");
            }
        }

        fn scroll(&mut self, amount: i32) {
            use enigo::{Axis, Mouse};
            // Wheel "units" arrive in pixel-ish multiples of 120; enigo
            // wants line counts, positive meaning down.
            let lines = (amount.abs() / 120).max(1);
            let delta = if amount > 0 { -lines } else { lines };
            if let Err(e) = self.enigo.scroll(delta, Axis::Vertical) {
                debug!("scroll failed: {e}");
            }
        }

        fn press(&mut self, key: Key) {
            use enigo::{Direction, Keyboard};
            let mapped = match key {
                Key::Enter => enigo::Key::Return,
                Key::Escape => enigo::Key::Escape,
                Key::Space => enigo::Key::Space,
            };
            if let Err(e) = self.enigo.key(mapped, Direction::Click) {
                debug!("key press failed: {e}");
            }
        }

        fn type_text(&mut self, text: &str) {
            use enigo::Keyboard;
            if let Err(e) = self.enigo.text(text) {
                warn!("text entry failed: {e}");
            }
        }

        fn paste_text(&mut self, _text: &str) -> bool {
            // No clipboard strategy in this backend; callers fall back to
            // per-character typing.
            false
        }
    }

    struct ScreenshotsScreen;

    impl Screen for ScreenshotsScreen {
        fn capture(&mut self, region: Rect) -> Option<RgbaImage> {
            let screens = screenshots::Screen::all().ok()?;
            let screen = screens
                .iter()
                .find(|s| {
                    let di = s.display_info;
                    region.x >= di.x
                        && region.y >= di.y
                        && region.x < di.x + di.width as i32
                        && region.y < di.y + di.height as i32
                })
                .or_else(|| screens.first())?;
            let di = screen.display_info;
            screen
                .capture_area(region.x - di.x, region.y - di.y, region.width, region.height)
                .ok()
        }
    }

    struct WinWindows;

    unsafe extern "system" fn enum_cb(hwnd: HWND, lparam: LPARAM) -> i32 {
        let list = &mut *(lparam as *mut Vec<(WindowId, String)>);
        if IsWindowVisible(hwnd) == 0 {
            return 1;
        }
        let mut buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32);
        if len > 0 {
            list.push((hwnd as WindowId, String::from_utf16_lossy(&buf[..len as usize])));
        }
        1
    }

    fn hwnd(id: WindowId) -> HWND {
        id as HWND
    }

    impl WindowControl for WinWindows {
        fn find_window(&mut self, title_fragments: &[String]) -> Option<WindowId> {
            let mut titles: Vec<(WindowId, String)> = Vec::new();
            unsafe {
                EnumWindows(Some(enum_cb), &mut titles as *mut _ as LPARAM);
            }
            let fragments: Vec<String> =
                title_fragments.iter().map(|f| f.to_lowercase()).collect();
            titles
                .iter()
                .find(|(_, title)| {
                    let title = title.to_lowercase();
                    fragments.iter().any(|f| title.contains(f))
                })
                .map(|(id, _)| *id)
        }

        fn is_valid(&mut self, id: WindowId) -> bool {
            unsafe { IsWindow(hwnd(id)) != 0 }
        }

        fn focus(&mut self, id: WindowId) -> bool {
            unsafe {
                if IsWindow(hwnd(id)) == 0 {
                    return false;
                }
                if IsIconic(hwnd(id)) != 0 {
                    ShowWindow(hwnd(id), SW_RESTORE);
                } else {
                    ShowWindow(hwnd(id), SW_SHOW);
                }
                for _ in 0..3 {
                    SetForegroundWindow(hwnd(id));
                    sleep_ms(100);
                }
                IsWindowVisible(hwnd(id)) != 0
            }
        }

        fn rect(&mut self, id: WindowId) -> Option<Rect> {
            let mut rect = RECT {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
            };
            let ok = unsafe { GetWindowRect(hwnd(id), &mut rect) };
            if ok == 0 {
                return None;
            }
            Some(Rect::new(
                rect.left,
                rect.top,
                (rect.right - rect.left).max(0) as u32,
                (rect.bottom - rect.top).max(0) as u32,
            ))
        }

        fn close(&mut self, id: WindowId) -> bool {
            unsafe { PostMessageW(hwnd(id), WM_CLOSE, 0, 0) != 0 }
        }
    }
}

#[cfg(not(all(feature = "desktop", target_os = "windows")))]
mod imp {
    use super::{ControlError, Desktop};

    pub fn desktop() -> Result<Desktop, ControlError> {
        Err(ControlError::BackendUnavailable)
    }
}
