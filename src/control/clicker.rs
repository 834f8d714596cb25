//! Aggressive template clicking
//!
//! Every button/icon interaction runs the same ladder: color match at high
//! confidence, grayscale at descending confidences, then a multi-scale
//! correlation fallback - repeated until a bounded deadline expires. This
//! absorbs UI scaling and theming variance without per-button tuning.

use std::time::{Duration, Instant};

use image::RgbaImage;
use log::{debug, info};

use crate::config::ClickPolicy;
use crate::vision::{locate_in, locate_scaled, LocateOptions};

use super::{click_many, sleep_ms, Desktop, Point, Rect, Screen};

/// One full ladder pass over a single frame. Frame-relative result.
fn sweep(frame: &RgbaImage, template: &RgbaImage, policy: &ClickPolicy) -> Option<Point> {
    for &confidence in &policy.confidences {
        if let Some(p) = locate_in(frame, template, &LocateOptions::color(confidence)) {
            return Some(p);
        }
    }
    for &confidence in &policy.grayscale_confidences {
        if let Some(p) = locate_in(frame, template, &LocateOptions::grayscale(confidence)) {
            return Some(p);
        }
    }
    if !policy.scales.is_empty() {
        if let Some(p) = locate_scaled(frame, template, &policy.scaled_confidences, &policy.scales)
        {
            return Some(p);
        }
    }
    None
}

/// Capture the region once and run the ladder. Absolute screen result.
pub fn locate_once(
    screen: &mut dyn Screen,
    region: Rect,
    template: &RgbaImage,
    policy: &ClickPolicy,
) -> Option<Point> {
    let frame = screen.capture(region)?;
    sweep(&frame, template, policy).map(|p| Point::new(region.x + p.x, region.y + p.y))
}

/// Keep probing until the template is found or `timeout` expires.
pub fn locate_within(
    screen: &mut dyn Screen,
    region: Rect,
    template: &RgbaImage,
    policy: &ClickPolicy,
    timeout: Duration,
) -> Option<Point> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(p) = locate_once(screen, region, template, policy) {
            return Some(p);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep_ms(policy.probe_interval_ms);
    }
}

/// Probe for the template within the policy deadline and click it.
/// Returns whether a click happened.
pub fn click_template(
    desktop: &mut Desktop,
    region: Rect,
    template: &RgbaImage,
    policy: &ClickPolicy,
) -> bool {
    let deadline = Instant::now() + Duration::from_millis(policy.timeout_ms);
    loop {
        if let Some(p) = locate_once(desktop.screen.as_mut(), region, template, policy) {
            info!("Clicking template at ({}, {})", p.x, p.y);
            click_many(
                desktop.input.as_mut(),
                p,
                policy.clicks,
                policy.click_interval_ms,
            );
            return true;
        }
        if Instant::now() >= deadline {
            debug!("template not found within {}ms", policy.timeout_ms);
            return false;
        }
        sleep_ms(policy.probe_interval_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{blit, scene_image, ui_patch, FakeInput, FixedScreen, InputEvent};

    fn frame_with_patch(patch: &RgbaImage, x: u32, y: u32) -> RgbaImage {
        let mut frame = scene_image(9, 128, 128);
        blit(&mut frame, patch, x as i32, y as i32);
        frame
    }

    #[test]
    fn test_locate_once_returns_absolute_coords() {
        let patch = ui_patch(1);
        let mut screen = FixedScreen::new(frame_with_patch(&patch, 40, 60));
        let region = Rect::new(1000, 500, 128, 128);
        let p = locate_once(&mut screen, region, &patch, &ClickPolicy::aggressive()).unwrap();
        assert_eq!(p.x, 1000 + 40 + patch.width() as i32 / 2);
        assert_eq!(p.y, 500 + 60 + patch.height() as i32 / 2);
    }

    #[test]
    fn test_click_template_clicks_per_policy() {
        let patch = ui_patch(1);
        let screen = FixedScreen::new(frame_with_patch(&patch, 20, 20));
        let input = FakeInput::default();
        let events = input.events.clone();
        let mut desktop = Desktop::new(
            Box::new(crate::testutil::FakeWindows::new(vec![])),
            Box::new(screen),
            Box::new(input),
        );
        let mut policy = ClickPolicy::aggressive();
        policy.click_interval_ms = 0;

        assert!(click_template(
            &mut desktop,
            Rect::new(0, 0, 128, 128),
            &patch,
            &policy
        ));
        let clicks: Vec<_> = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, InputEvent::Click(_)))
            .cloned()
            .collect();
        assert_eq!(clicks.len(), 2);
    }

    #[test]
    fn test_click_template_gives_up_after_deadline() {
        let screen = FixedScreen::new(scene_image(9, 128, 128));
        let input = FakeInput::default();
        let mut desktop = Desktop::new(
            Box::new(crate::testutil::FakeWindows::new(vec![])),
            Box::new(screen),
            Box::new(input),
        );
        let policy = ClickPolicy::aggressive().with_timeout(10);
        assert!(!click_template(
            &mut desktop,
            Rect::new(0, 0, 128, 128),
            &ui_patch(1),
            &policy
        ));
    }
}
