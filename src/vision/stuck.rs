//! Stuck detection
//!
//! Liveness check over the classification stream: the same scene reported
//! for `threshold` consecutive ticks means the UI stopped reacting and a
//! scene-specific recovery action is due. The counter resets after firing
//! but the scene is kept, so recovery re-fires every `threshold` identical
//! ticks while the UI stays frozen.

/// Tracks consecutive identical scene classifications.
#[derive(Debug, Clone)]
pub struct StuckDetector {
    threshold: u32,
    last_scene: Option<String>,
    repeats: u32,
}

impl StuckDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last_scene: None,
            repeats: 0,
        }
    }

    /// Record one classification. Returns true exactly when the repeat
    /// count reaches the threshold; the count is then reset to zero.
    pub fn observe(&mut self, scene: &str) -> bool {
        if self.last_scene.as_deref() == Some(scene) {
            self.repeats += 1;
        } else {
            self.last_scene = Some(scene.to_string());
            self.repeats = 1;
        }
        if self.repeats >= self.threshold {
            self.repeats = 0;
            return true;
        }
        false
    }

    /// Forget everything, e.g. after a stage transition that makes the
    /// history meaningless.
    pub fn reset(&mut self) {
        self.last_scene = None;
        self.repeats = 0;
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_never_fires() {
        let mut detector = StuckDetector::new(10);
        for _ in 0..9 {
            assert!(!detector.observe("scene_a"));
        }
    }

    #[test]
    fn test_threshold_tick_fires_exactly_once() {
        // Ten identical observations then a different scene: exactly one
        // recovery, after the tenth, and the counter is reset before the
        // different scene arrives.
        let mut detector = StuckDetector::new(10);
        let mut fired = 0;
        for _ in 0..10 {
            if detector.observe("scene_a") {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(detector.repeats(), 0);
        assert!(!detector.observe("scene_b"));
        assert_eq!(detector.repeats(), 1);
    }

    #[test]
    fn test_refires_while_still_stuck() {
        let mut detector = StuckDetector::new(3);
        let mut fired = 0;
        for _ in 0..9 {
            if detector.observe("frozen") {
                fired += 1;
            }
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_scene_change_resets_count() {
        let mut detector = StuckDetector::new(3);
        assert!(!detector.observe("a"));
        assert!(!detector.observe("a"));
        assert!(!detector.observe("b"));
        assert!(!detector.observe("b"));
        assert!(detector.observe("b"));
    }
}
