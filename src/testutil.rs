//! Shared test fixtures: synthetic scene images, UI patches and fake
//! desktop collaborators.

use std::cell::RefCell;
use std::rc::Rc;

use image::{Rgba, RgbaImage};

use crate::control::{Input, Key, Point, Rect, Screen, WindowControl, WindowId};

/// Deterministic synthetic scene background. Different seeds produce
/// visually (and perceptually-hash) distinct ramp patterns.
pub fn scene_image(seed: u32, w: u32, h: u32) -> RgbaImage {
    let a = 1 + (seed % 11);
    let b = 1 + ((seed * 7) % 13);
    RgbaImage::from_fn(w, h, |x, y| {
        let v = ((x * a + y * b) % 256) as u8;
        let g = ((x * b + y * a) % 256) as u8;
        Rgba([v, g, 255 - v, 255])
    })
}

/// Small high-frequency patch standing in for a button/icon crop. Seeds
/// 0..=7 all get distinct stripe geometry, so patches co-present in one
/// frame never correlate.
pub fn ui_patch(seed: u32) -> RgbaImage {
    let palette: [(u8, u8, u8); 6] = [
        (255, 64, 64),
        (64, 255, 64),
        (64, 64, 255),
        (255, 255, 64),
        (255, 64, 255),
        (64, 255, 255),
    ];
    let (r, g, b) = palette[(seed as usize) % palette.len()];
    let vertical = seed % 2 == 0;
    let offset = (seed / 2) % 4;
    RgbaImage::from_fn(16, 16, |x, y| {
        let c = if vertical { x } else { y };
        if (c + offset) % 4 == 0 {
            Rgba([r, g, b, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}

/// Paste `patch` into `frame` at the given position.
pub fn blit(frame: &mut RgbaImage, patch: &RgbaImage, x: i32, y: i32) {
    image::imageops::replace(frame, patch, x as i64, y as i64);
}

/// Everything an `Input` implementation can be asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MoveTo(Point),
    Click(Point),
    Scroll(i32),
    Press(Key),
    Type(String),
    Paste(String),
}

/// Input fake that records every event; optionally forwards them to a
/// shared observer so a UI simulation can react.
#[derive(Default)]
pub struct FakeInput {
    pub events: Rc<RefCell<Vec<InputEvent>>>,
    pub observer: Option<Rc<RefCell<dyn FnMut(&InputEvent)>>>,
    /// Whether `paste_text` reports success.
    pub clipboard_ok: bool,
}

impl FakeInput {
    pub fn observed(observer: Rc<RefCell<dyn FnMut(&InputEvent)>>) -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
            observer: Some(observer),
            clipboard_ok: true,
        }
    }

    fn record(&mut self, event: InputEvent) {
        if let Some(observer) = &self.observer {
            let mut observer = observer.borrow_mut();
            (&mut *observer)(&event);
        }
        self.events.borrow_mut().push(event);
    }
}

impl Input for FakeInput {
    fn move_to(&mut self, p: Point) {
        self.record(InputEvent::MoveTo(p));
    }

    fn click(&mut self, p: Point) {
        self.record(InputEvent::Click(p));
    }

    fn scroll(&mut self, amount: i32) {
        self.record(InputEvent::Scroll(amount));
    }

    fn press(&mut self, key: Key) {
        self.record(InputEvent::Press(key));
    }

    fn type_text(&mut self, text: &str) {
        self.record(InputEvent::Type(text.to_string()));
    }

    fn paste_text(&mut self, text: &str) -> bool {
        self.record(InputEvent::Paste(text.to_string()));
        self.clipboard_ok
    }
}

/// Screen fake that always returns the same frame.
pub struct FixedScreen {
    pub frame: RgbaImage,
}

impl FixedScreen {
    pub fn new(frame: RgbaImage) -> Self {
        Self { frame }
    }
}

impl Screen for FixedScreen {
    fn capture(&mut self, _region: Rect) -> Option<RgbaImage> {
        Some(self.frame.clone())
    }
}

/// Screen fake that renders from a shared frame source.
pub struct SharedScreen {
    pub source: Rc<RefCell<dyn FnMut(Rect) -> Option<RgbaImage>>>,
}

impl Screen for SharedScreen {
    fn capture(&mut self, region: Rect) -> Option<RgbaImage> {
        let mut source = self.source.borrow_mut();
        (&mut *source)(region)
    }
}

/// Window-control fake over an editable window list.
pub struct FakeWindows {
    pub windows: Vec<(WindowId, String)>,
    pub rect: Rect,
    pub focus_ok: bool,
    pub find_calls: u32,
    pub closed: Vec<WindowId>,
    pub tray_recoveries: u32,
}

impl FakeWindows {
    pub fn new(windows: Vec<(WindowId, String)>) -> Self {
        Self {
            windows,
            rect: Rect::new(0, 0, 128, 128),
            focus_ok: true,
            find_calls: 0,
            closed: Vec::new(),
            tray_recoveries: 0,
        }
    }

    pub fn add(&mut self, id: WindowId, title: String) {
        self.windows.push((id, title));
    }

    pub fn remove(&mut self, id: WindowId) {
        self.windows.retain(|(wid, _)| *wid != id);
    }
}

impl WindowControl for FakeWindows {
    fn find_window(&mut self, title_fragments: &[String]) -> Option<WindowId> {
        self.find_calls += 1;
        self.windows
            .iter()
            .find(|(_, title)| {
                let title = title.to_lowercase();
                title_fragments
                    .iter()
                    .any(|f| title.contains(&f.to_lowercase()))
            })
            .map(|(id, _)| *id)
    }

    fn is_valid(&mut self, id: WindowId) -> bool {
        self.windows.iter().any(|(wid, _)| *wid == id)
    }

    fn focus(&mut self, _id: WindowId) -> bool {
        self.focus_ok
    }

    fn rect(&mut self, _id: WindowId) -> Option<Rect> {
        Some(self.rect)
    }

    fn close(&mut self, id: WindowId) -> bool {
        self.closed.push(id);
        self.remove(id);
        true
    }

    fn recover_from_tray(&mut self) -> bool {
        self.tray_recoveries += 1;
        false
    }
}

impl WindowControl for Rc<RefCell<FakeWindows>> {
    fn find_window(&mut self, title_fragments: &[String]) -> Option<WindowId> {
        self.borrow_mut().find_window(title_fragments)
    }

    fn is_valid(&mut self, id: WindowId) -> bool {
        self.borrow_mut().is_valid(id)
    }

    fn focus(&mut self, id: WindowId) -> bool {
        self.borrow_mut().focus(id)
    }

    fn rect(&mut self, id: WindowId) -> Option<Rect> {
        self.borrow_mut().rect(id)
    }

    fn close(&mut self, id: WindowId) -> bool {
        self.borrow_mut().close(id)
    }

    fn recover_from_tray(&mut self) -> bool {
        self.borrow_mut().recover_from_tray()
    }
}

/// Settings preset with all delays zeroed so tests run at full speed.
pub fn fast_settings() -> crate::config::Settings {
    let mut settings = crate::config::Settings::default();
    settings.timings.poll_interval_ms = 0;
    settings.timings.think_delay_ms = 0;
    settings.timings.step_delay_ms = 0;
    settings.timings.key_interval_ms = 0;
    settings.timings.pause_sleep_ms = 0;
    settings.launcher.avatar_settle_ms = 0;
    settings.launcher.play_hover_ms = 0;
    settings.launcher.login_error_interval_ms = 0;
    settings.launcher.game_window_interval_ms = 0;
    settings.launcher.game_window_timeout_ms = 50;
    settings.launcher.locate.timeout_ms = 0;
    settings.game.terminal_hold_ms = 0;
    settings.game.post_claim_hold_ms = 0;
    settings.game.tutorial_skip_delay_ms = 0;
    settings.game.spawn_wait_ms = 0;
    settings.game.time_budget_secs = 10;
    settings.game.click.timeout_ms = 0;
    settings.game.click.probe_interval_ms = 0;
    settings.game.click.click_interval_ms = 0;
    settings.game.claim_click.timeout_ms = 0;
    settings.game.claim_click.probe_interval_ms = 0;
    settings.game.claim_click.click_interval_ms = 0;
    settings.scroll.rapid_delay_ms = 0;
    settings.scroll.settle_ms = 0;
    settings.scroll.top_steps = 6;
    settings.scroll.max_steps = 10;
    settings.scroll.rescan_max_steps = 12;
    settings
}
