//! Scroll memory and scroll driving
//!
//! Reward icons live in a long scrollable list. The first successful search
//! records how many scroll steps were needed; later runs replay that count
//! before probing. The persisted value only ever tightens downward because
//! list contents drift toward the top over time, never further down.

use std::path::PathBuf;

use log::{debug, warn};

use crate::config::ScrollSettings;
use crate::control::{sleep_ms, Input, Point, Rect};

/// Per-item scroll step counts persisted across runs, one plain-text
/// integer file per reward-item id.
#[derive(Debug, Clone)]
pub struct ScrollMemory {
    dir: PathBuf,
}

impl ScrollMemory {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_for(&self, item_id: &str) -> PathBuf {
        self.dir.join(format!("{item_id}.txt"))
    }

    /// Remembered step count for an item; 0 when nothing is remembered.
    pub fn read(&self, item_id: &str) -> u32 {
        let path = self.file_for(item_id);
        match std::fs::read_to_string(&path) {
            Ok(raw) => raw.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Record a measured step count. Keeps the minimum of the stored and
    /// the new value, so the memory is monotonically non-increasing.
    pub fn record(&self, item_id: &str, steps: u32) {
        let old = self.read(item_id);
        let new_val = if old == 0 { steps } else { old.min(steps) };
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("cannot create scroll memory dir {}: {e}", self.dir.display());
            return;
        }
        if let Err(e) = std::fs::write(self.file_for(item_id), new_val.to_string()) {
            warn!("cannot persist scroll memory for {item_id}: {e}");
        } else {
            debug!("scroll memory for {item_id}: {old} -> {new_val}");
        }
    }
}

/// Cursor anchor used while scrolling: inside the list, shifted left so no
/// tooltip pops under the cursor.
pub fn anchor_point(region: Rect, settings: &ScrollSettings) -> Point {
    let p = region.at(settings.anchor.0, settings.anchor.1);
    let x = (p.x - settings.anchor_left_shift).max(region.x + 20);
    Point::new(x, p.y)
}

/// Park the cursor at the scroll anchor.
pub fn move_to_anchor(input: &mut dyn Input, region: Rect, settings: &ScrollSettings) -> Point {
    let anchor = anchor_point(region, settings);
    input.move_to(anchor);
    anchor
}

/// Aggressively scroll back to the top of the list.
pub fn scroll_to_top(input: &mut dyn Input, region: Rect, settings: &ScrollSettings) {
    move_to_anchor(input, region, settings);
    for _ in 0..settings.top_steps {
        input.scroll(settings.top_units);
        sleep_ms(settings.rapid_delay_ms);
    }
}

/// One downward probe step.
pub fn scroll_step_down(input: &mut dyn Input, settings: &ScrollSettings) {
    input.scroll(-settings.step_units.abs());
}

/// Replay `steps` downward scrolls quickly: anchor once, then fire.
pub fn rapid_scroll_down(
    input: &mut dyn Input,
    region: Rect,
    settings: &ScrollSettings,
    steps: u32,
) {
    move_to_anchor(input, region, settings);
    for _ in 0..steps {
        input.scroll(-settings.step_units.abs());
        sleep_ms(settings.rapid_delay_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeInput, InputEvent};

    #[test]
    fn test_memory_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let memory = ScrollMemory::new(dir.path().to_path_buf());
        assert_eq!(memory.read("is7"), 0);
    }

    #[test]
    fn test_memory_is_monotonically_non_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let memory = ScrollMemory::new(dir.path().to_path_buf());

        memory.record("is7", 12);
        assert_eq!(memory.read("is7"), 12);

        // A larger measurement never raises the stored value.
        memory.record("is7", 20);
        assert_eq!(memory.read("is7"), 12);

        // A smaller one tightens it.
        memory.record("is7", 7);
        assert_eq!(memory.read("is7"), 7);
    }

    #[test]
    fn test_memory_is_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let memory = ScrollMemory::new(dir.path().to_path_buf());
        memory.record("is7", 5);
        memory.record("fv4005", 9);
        assert_eq!(memory.read("is7"), 5);
        assert_eq!(memory.read("fv4005"), 9);
    }

    #[test]
    fn test_garbage_file_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("is7.txt"), "not a number").unwrap();
        let memory = ScrollMemory::new(dir.path().to_path_buf());
        assert_eq!(memory.read("is7"), 0);
    }

    #[test]
    fn test_scroll_to_top_anchors_then_scrolls_up() {
        let mut input = FakeInput::default();
        let events = input.events.clone();
        let settings = ScrollSettings {
            top_steps: 3,
            rapid_delay_ms: 0,
            ..Default::default()
        };
        scroll_to_top(&mut input, Rect::new(0, 0, 400, 400), &settings);

        let events = events.borrow();
        assert!(matches!(events[0], InputEvent::MoveTo(_)));
        let ups = events
            .iter()
            .filter(|e| matches!(e, InputEvent::Scroll(amount) if *amount > 0))
            .count();
        assert_eq!(ups, 3);
    }

    #[test]
    fn test_anchor_point_shifts_left_within_window() {
        let settings = ScrollSettings::default();
        let region = Rect::new(0, 0, 800, 600);
        let anchor = anchor_point(region, &settings);
        assert_eq!(anchor.x, 400 - settings.anchor_left_shift);
        assert_eq!(anchor.y, 450);

        // A narrow window clamps the shift instead of leaving the window.
        let narrow = Rect::new(100, 100, 300, 300);
        assert_eq!(anchor_point(narrow, &settings).x, 120);
    }
}
