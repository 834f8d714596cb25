//! Reward item location and selection
//!
//! Icons are found by template correlation inside the game window; the
//! scroll position that brings an icon into view is persisted per item so
//! later runs replay it instead of rescanning the whole list.

use log::{debug, info};

use crate::config::{ClickPolicy, RewardItem, ScrollSettings};
use crate::control::{click_many, locate_once, sleep_ms, Desktop, Point, Rect};
use crate::vision::TemplateStore;

use super::scroll::{self, ScrollMemory};

/// Pause between moving onto an icon and clicking it.
const PRE_CLICK_PAUSE_MS: u64 = 100;

/// Single-frame probe policy: the icon ladder without the scale sweep.
fn icon_policy(policy: &ClickPolicy) -> ClickPolicy {
    ClickPolicy {
        scales: Vec::new(),
        scaled_confidences: Vec::new(),
        ..policy.clone()
    }
}

/// Locate the item's icon in the current frame, falling back to the
/// trimmed crop when the full icon is occluded by a description overlay.
pub fn locate_icon(
    desktop: &mut Desktop,
    region: Rect,
    templates: &mut TemplateStore,
    item: &RewardItem,
    policy: &ClickPolicy,
) -> Option<Point> {
    let probe = icon_policy(policy);
    if let Some(template) = templates.get(&item.icon) {
        if let Some(p) = locate_once(desktop.screen.as_mut(), region, template, &probe) {
            return Some(p);
        }
    }
    if let Some(alt) = item.alt_icon.as_deref() {
        if let Some(template) = templates.get(alt) {
            if let Some(p) = locate_once(desktop.screen.as_mut(), region, template, &probe) {
                return Some(p);
            }
        }
    }
    None
}

/// Whether the item's "selected" marker is currently visible.
pub fn is_selected(
    desktop: &mut Desktop,
    region: Rect,
    templates: &mut TemplateStore,
    item: &RewardItem,
    policy: &ClickPolicy,
) -> bool {
    let probe = icon_policy(policy);
    templates
        .get(&item.selected_marker)
        .and_then(|template| locate_once(desktop.screen.as_mut(), region, template, &probe))
        .is_some()
}

fn settle_and_click(
    desktop: &mut Desktop,
    region: Rect,
    templates: &mut TemplateStore,
    item: &RewardItem,
    policy: &ClickPolicy,
    settle_ms: u64,
    found: Point,
) {
    // Inertial scrolling may still be moving the list; wait it out and
    // re-locate so the click lands on fresh coordinates.
    sleep_ms(settle_ms);
    let target = locate_icon(desktop, region, templates, item, policy).unwrap_or(found);
    desktop.input.move_to(target);
    sleep_ms(PRE_CLICK_PAUSE_MS);
    click_many(
        desktop.input.as_mut(),
        target,
        policy.clicks,
        policy.click_interval_ms,
    );
}

/// Find the item in the scrollable list and click it.
///
/// Replays the persisted scroll offset when one exists, with a full
/// measured scan from the top as fallback; a successful measurement is
/// persisted (tightening-only). Returns the number of scroll steps used.
pub fn find_and_click_by_memory(
    desktop: &mut Desktop,
    region: Rect,
    templates: &mut TemplateStore,
    memory: &ScrollMemory,
    item: &RewardItem,
    scroll_settings: &ScrollSettings,
    policy: &ClickPolicy,
    max_steps: u32,
) -> Option<u32> {
    let saved = memory.read(&item.id);
    if saved > 0 {
        debug!("replaying {} scroll steps for '{}'", saved, item.id);
        scroll::scroll_to_top(desktop.input.as_mut(), region, scroll_settings);
        scroll::rapid_scroll_down(desktop.input.as_mut(), region, scroll_settings, saved);
        if let Some(p) = locate_icon(desktop, region, templates, item, policy) {
            settle_and_click(
                desktop,
                region,
                templates,
                item,
                policy,
                scroll_settings.settle_ms,
                p,
            );
            info!("selected '{}' at remembered offset {}", item.id, saved);
            return Some(saved);
        }
        debug!("'{}' not at remembered offset, rescanning", item.id);
    }

    scroll::scroll_to_top(desktop.input.as_mut(), region, scroll_settings);
    scroll::move_to_anchor(desktop.input.as_mut(), region, scroll_settings);
    let mut used = 0;
    for _ in 0..max_steps.max(1) {
        if let Some(p) = locate_icon(desktop, region, templates, item, policy) {
            settle_and_click(
                desktop,
                region,
                templates,
                item,
                policy,
                scroll_settings.settle_ms,
                p,
            );
            memory.record(&item.id, used);
            info!("selected '{}' after {} measured steps", item.id, used);
            return Some(used);
        }
        scroll::scroll_step_down(desktop.input.as_mut(), scroll_settings);
        used += 1;
        sleep_ms(scroll_settings.rapid_delay_ms);
    }
    None
}
