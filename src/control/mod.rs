//! Desktop control layer
//!
//! Defines the collaborator interfaces the automation drives: window
//! discovery/activation, screen capture and raw input injection. The stage
//! machines only ever talk to these traits; a native backend (behind the
//! `desktop` cargo feature) wires them to the real OS.

pub mod clicker;
pub mod flags;
pub mod native;
pub mod window;

pub use clicker::{click_template, locate_once, locate_within};
pub use flags::ControlFlags;
pub use window::WindowCache;

use image::RgbaImage;

/// Opaque window handle. The backend decides what it actually encodes.
pub type WindowId = isize;

/// A point in absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Shift the point by the given deltas.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// A rectangle in absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center of the rectangle.
    pub fn center(&self) -> Point {
        Point::new(
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    /// Absolute point at the given fractions of the rectangle's size.
    pub fn at(&self, rx: f32, ry: f32) -> Point {
        Point::new(
            self.x + (rx * self.width as f32) as i32,
            self.y + (ry * self.height as f32) as i32,
        )
    }

    /// Sub-rectangle covering the requested panel of a launcher-style
    /// two-panel layout. The split ratio matches the launcher UI.
    pub fn panel(&self, panel: Panel) -> Rect {
        let split = (self.width as f32 * 0.46) as u32;
        match panel {
            Panel::Any => *self,
            Panel::Left => Rect::new(self.x, self.y, split, self.height),
            Panel::Right => Rect::new(
                self.x + split as i32,
                self.y,
                self.width.saturating_sub(split),
                self.height,
            ),
        }
    }
}

/// Which part of the window a template search is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Any,
    Left,
    Right,
}

/// Keys the flows press. Only the handful the target UIs react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Space,
}

/// Window discovery and activation.
pub trait WindowControl {
    /// Find the first visible top-level window whose title contains any of
    /// the given fragments (case-insensitive).
    fn find_window(&mut self, title_fragments: &[String]) -> Option<WindowId>;

    /// Whether a previously returned handle still refers to a live window.
    fn is_valid(&mut self, id: WindowId) -> bool;

    /// Restore a minimized window and bring it to the foreground.
    fn focus(&mut self, id: WindowId) -> bool;

    /// Outer rectangle of the window in screen coordinates.
    fn rect(&mut self, id: WindowId) -> Option<Rect>;

    /// Ask the window to close.
    fn close(&mut self, id: WindowId) -> bool;

    /// Last-resort recovery when the window cannot be found: poke the
    /// system tray / taskbar so a minimized-to-tray launcher resurfaces.
    fn recover_from_tray(&mut self) -> bool {
        false
    }
}

/// Screen region capture.
pub trait Screen {
    /// Capture the given region. `None` on transient capture failure.
    fn capture(&mut self, region: Rect) -> Option<RgbaImage>;
}

/// Raw input injection.
pub trait Input {
    fn move_to(&mut self, p: Point);
    fn click(&mut self, p: Point);
    /// Scroll vertically; positive moves the content up (wheel up).
    fn scroll(&mut self, amount: i32);
    fn press(&mut self, key: Key);
    fn type_text(&mut self, text: &str);
    /// Clipboard-paste the text into the focused control. Returns false if
    /// the clipboard strategy is unavailable so callers can fall back to
    /// per-character typing.
    fn paste_text(&mut self, text: &str) -> bool;
}

/// Accessibility-level form filling (the "set value" strategy). Optional;
/// the login flow falls back to template-located fields when absent or
/// unsuccessful.
pub trait FormFiller {
    fn fill_login(&mut self, email: &str, password: &str) -> bool;
}

/// Bundle of collaborator implementations, owned by the orchestrator and
/// passed by reference into the stage machines.
pub struct Desktop {
    pub windows: Box<dyn WindowControl>,
    pub screen: Box<dyn Screen>,
    pub input: Box<dyn Input>,
    pub forms: Option<Box<dyn FormFiller>>,
}

impl Desktop {
    pub fn new(
        windows: Box<dyn WindowControl>,
        screen: Box<dyn Screen>,
        input: Box<dyn Input>,
    ) -> Self {
        Self {
            windows,
            screen,
            input,
            forms: None,
        }
    }

    pub fn with_forms(mut self, forms: Box<dyn FormFiller>) -> Self {
        self.forms = Some(forms);
        self
    }
}

/// Click the same point several times with a short pause in between.
pub fn click_many(input: &mut dyn Input, p: Point, times: u32, interval_ms: u64) {
    for _ in 0..times.max(1) {
        input.click(p);
        sleep_ms(interval_ms);
    }
}

/// Convenience wrapper around `std::thread::sleep`.
pub fn sleep_ms(ms: u64) {
    if ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }
}

/// Control layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("no native desktop backend is available on this platform/build")]
    BackendUnavailable,
    #[error("failed to initialize desktop backend: {0}")]
    Init(String),
}
