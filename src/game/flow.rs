//! In-game stage machine
//!
//! A strictly staged pipeline over the post-login client: skip the intro
//! video, acknowledge the first reward screen, then for each configured
//! reward item select it in the scrollable list and claim it, and finally
//! wait for a terminal scene to hold before closing the client. Scenes are
//! polled at a fixed cadence, gated by the coarse phase, and watched by the
//! stuck detector, whose recovery actions are keyed by scene.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Settings;
use crate::control::{
    click_many, click_template, sleep_ms, ControlFlags, Desktop, Key, Rect, WindowCache,
};
use crate::vision::templates::names;
use crate::vision::{SceneClassifier, StuckDetector, TemplateStore};

use super::phase::Phase;
use super::rewards;
use super::scenes;
use super::scroll::{self, ScrollMemory};

/// How one in-game run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// A terminal scene was reached and held for the grace period.
    Completed { rewards: Vec<String> },
    /// The wall-clock budget expired without reaching a terminal scene.
    TimeBudgetExpired,
    /// The stop flag was raised.
    Stopped,
}

/// Fine-grained step inside the post phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Wait for the intro video and skip it
    SkipIntro,
    /// Acknowledge the first reward screen until the selection list shows
    FirstRewardScreen,
    /// Locate and click reward item `index` in the scrollable list
    SelectReward { index: usize },
    /// Confirm the selection
    ConfirmSelection { index: usize },
    /// Wait for the claim screen and hit the claim button
    AwaitClaimScreen { index: usize },
    /// Keep the claim pressed while the grant animates, then acknowledge
    PostClaimHold { index: usize },
    /// Wait for the selection list to come back for item `index`
    AwaitRewardReturn { index: usize },
    /// Wait for a terminal scene and hold it for the grace period
    AwaitTerminal,
}

/// Drives the game client from just-launched to rewards-granted.
pub struct GameFlow<'a> {
    settings: &'a Settings,
    classifier: &'a SceneClassifier,
    templates: &'a mut TemplateStore,
    desktop: &'a mut Desktop,
    flags: ControlFlags,
    window: WindowCache,
    memory: ScrollMemory,
    phase: Phase,
    stage: Stage,
    stuck: StuckDetector,
    chosen: Vec<String>,
    classifier_paused: bool,
    early_terminal_seen: u32,
    terminal_hold_since: Option<Instant>,
    claim_clicked_at: Option<Instant>,
    last_snapshot: Option<Instant>,
}

impl<'a> GameFlow<'a> {
    pub fn new(
        settings: &'a Settings,
        classifier: &'a SceneClassifier,
        templates: &'a mut TemplateStore,
        desktop: &'a mut Desktop,
        flags: ControlFlags,
    ) -> Self {
        let window = WindowCache::new(settings.windows.client_titles.clone());
        let memory = ScrollMemory::new(settings.batch.scroll_memory_dir());
        Self {
            settings,
            classifier,
            templates,
            desktop,
            flags,
            window,
            memory,
            phase: Phase::Pre,
            stage: Stage::SkipIntro,
            stuck: StuckDetector::new(settings.stuck.threshold),
            chosen: Vec::new(),
            classifier_paused: false,
            early_terminal_seen: 0,
            terminal_hold_since: None,
            claim_clicked_at: None,
            last_snapshot: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Reward ids selected so far, deduplicated, insertion order kept.
    pub fn chosen_rewards(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.chosen
            .iter()
            .filter(|id| seen.insert(id.as_str().to_string()))
            .cloned()
            .collect()
    }

    /// Poll the client until a terminal scene holds, the stop flag is
    /// raised, or the time budget runs out.
    pub fn run(&mut self) -> FlowOutcome {
        let budget = Duration::from_secs(self.settings.game.time_budget_secs);
        let poll = Duration::from_millis(self.settings.timings.poll_interval_ms);
        let started = Instant::now();
        let mut last_tick: Option<Instant> = None;

        while started.elapsed() < budget {
            if self.flags.stop_requested() {
                info!("Stop requested, aborting in-game flow");
                return FlowOutcome::Stopped;
            }
            if self.flags.paused() {
                sleep_ms(self.settings.timings.pause_sleep_ms);
                continue;
            }
            if let Some(t) = last_tick {
                if t.elapsed() < poll {
                    sleep_ms(50.min(self.settings.timings.poll_interval_ms));
                    continue;
                }
            }
            last_tick = Some(Instant::now());

            if let Some(outcome) = self.tick() {
                return outcome;
            }
        }
        warn!("Time budget expired without reaching a terminal scene");
        FlowOutcome::TimeBudgetExpired
    }

    /// One capture + classify + dispatch round.
    fn tick(&mut self) -> Option<FlowOutcome> {
        let region = self.window.rect(self.desktop.windows.as_mut())?;
        let frame = match self.desktop.screen.capture(region) {
            Some(frame) => frame,
            None => {
                sleep_ms(100.min(self.settings.timings.poll_interval_ms));
                return None;
            }
        };
        self.maybe_snapshot(&frame);

        let mut scene: Option<String> = None;
        if !self.classifier_paused {
            let m = self.classifier.classify(&frame)?;
            let label = match scenes::normalize(&m.scene) {
                Some(label) => label,
                None => {
                    debug!("Skip non-game scene: {}", m.scene);
                    return None;
                }
            };

            if self.is_terminal(&label) {
                if self.phase != Phase::Post {
                    self.early_terminal_seen += 1;
                    debug!("Ignore terminal scene outside post phase");
                    if self.early_terminal_seen >= self.settings.game.early_terminal_sightings {
                        info!("Terminal scene seen repeatedly outside post - rewards already collected");
                        self.close_game();
                        return Some(FlowOutcome::Completed {
                            rewards: self.chosen_rewards(),
                        });
                    }
                    return None;
                }
                if self.stage != Stage::AwaitTerminal {
                    self.stage = Stage::AwaitTerminal;
                }
            }

            // Accounts without a tutorial jump straight to the intro video.
            if label == scenes::VIDEO && self.phase != Phase::Post {
                info!("Intro video during {:?} phase -> switching to post", self.phase);
                self.phase = Phase::Post;
                self.stage = Stage::SkipIntro;
            }

            if !self.phase.allows(&label) {
                debug!("Filtered by phase {:?}: {label}", self.phase);
                return None;
            }
            info!("Scene[{:?}]: {label} (dist={})", self.phase, m.distance);

            if self.stuck.observe(&label) {
                warn!("Stuck on '{label}' -> recovery");
                self.recover(&label, region);
                return None;
            }
            scene = Some(label);
        }

        if let Some(label) = scene.as_deref() {
            match label {
                scenes::LOADING if self.phase != Phase::Post => {
                    return None;
                }
                scenes::CUTSCENE | scenes::TUTORIAL1 | scenes::TUTORIAL2
                    if self.phase != Phase::Post =>
                {
                    self.advance_cutscene(label, region);
                    return None;
                }
                scenes::TUTORIAL_MENU => {
                    info!("Planned action: click tutorial skip");
                    sleep_ms(self.settings.timings.think_delay_ms);
                    if !self.click_ui(region, names::SKIP_TUTORIAL) {
                        warn!("tutorial skip button not found");
                    }
                    return None;
                }
                scenes::TUTORIAL_MENU_CONFIRM => {
                    info!("Planned action: confirm tutorial skip");
                    sleep_ms(self.settings.timings.think_delay_ms);
                    if !self.click_ui(region, names::SKIP_TUTORIAL_CONFIRM) {
                        warn!("tutorial skip confirmation not found");
                    }
                    self.phase = Phase::Post;
                    return None;
                }
                _ => {}
            }
        }

        if self.classifier_paused {
            // Mechanically keep pressing the confirmation until it lands,
            // then resume classification in the post phase.
            self.click_ui(region, names::SKIP_TUTORIAL_CONFIRM);
            self.classifier_paused = false;
            self.phase = Phase::Post;
            return None;
        }

        if self.phase == Phase::Post {
            return self.dispatch_post(scene.as_deref(), region);
        }
        None
    }

    /// Enter through a cutscene; on tutorial scenes also run the mechanical
    /// skip sequence and pause classification until it is confirmed.
    fn advance_cutscene(&mut self, label: &str, region: Rect) {
        info!("Planned action: press Enter");
        sleep_ms(self.settings.timings.think_delay_ms);
        self.press(Key::Enter);
        if label == scenes::TUTORIAL1 || label == scenes::TUTORIAL2 {
            self.phase = Phase::Tutorial;
            sleep_ms(self.settings.game.tutorial_skip_delay_ms);
            self.press(Key::Escape);
            sleep_ms(self.settings.timings.step_delay_ms);
            self.desktop.input.move_to(region.center());
            if !self.click_ui(region, names::SKIP_TUTORIAL) {
                self.click_ui(region, names::SKIP_TUTORIAL_ALT);
            }
            sleep_ms(self.settings.timings.key_interval_ms);
            self.click_ui(region, names::SKIP_TUTORIAL_CONFIRM);
            self.classifier_paused = true;
        }
    }

    /// The post-phase pipeline proper.
    fn dispatch_post(&mut self, scene: Option<&str>, region: Rect) -> Option<FlowOutcome> {
        let items = self.settings.game.rewards.clone();
        match self.stage {
            Stage::SkipIntro => {
                if scene == Some(scenes::VIDEO) {
                    info!("Post: intro video -> Escape (+Enter fallback)");
                    self.press(Key::Escape);
                    sleep_ms(self.settings.timings.key_interval_ms);
                    self.press(Key::Enter);
                    sleep_ms(self.settings.timings.think_delay_ms);
                    if self.still_video(region) {
                        self.press(Key::Escape);
                        sleep_ms(self.settings.timings.key_interval_ms);
                        self.press(Key::Enter);
                        self.press(Key::Space);
                        self.press(Key::Enter);
                    }
                    self.stage = Stage::FirstRewardScreen;
                }
                None
            }

            Stage::FirstRewardScreen => {
                if scene == Some(scenes::TANK_SELECT) {
                    self.stage = Stage::SelectReward { index: 0 };
                } else {
                    info!("Post: first reward screen -> Enter x2");
                    self.press(Key::Enter);
                    sleep_ms(self.settings.timings.key_interval_ms);
                    self.press(Key::Enter);
                    if scene == Some(scenes::VIDEO) {
                        self.press(Key::Enter);
                        self.press(Key::Escape);
                    }
                }
                None
            }

            Stage::SelectReward { index } => {
                // Defensive regression: bounced back to the first reward
                // screen means the acknowledgment did not land.
                if index == 0 && scene == Some(scenes::REWARD_SCREEN1) {
                    self.press(Key::Enter);
                    sleep_ms(self.settings.timings.key_interval_ms);
                    self.press(Key::Enter);
                    self.stage = Stage::FirstRewardScreen;
                    return None;
                }
                if scene != Some(scenes::TANK_SELECT) {
                    return None;
                }
                let Some(item) = items.get(index) else {
                    self.stage = Stage::AwaitTerminal;
                    return None;
                };
                if rewards::find_and_click_by_memory(
                    self.desktop,
                    region,
                    self.templates,
                    &self.memory,
                    item,
                    &self.settings.scroll,
                    &self.settings.game.click,
                    self.settings.scroll.max_steps,
                )
                .is_some()
                {
                    self.chosen.push(item.id.clone());
                    self.stage = Stage::ConfirmSelection { index };
                }
                None
            }

            Stage::ConfirmSelection { index } => {
                self.press(Key::Enter);
                self.stage = Stage::AwaitClaimScreen { index };
                None
            }

            Stage::AwaitClaimScreen { index } => {
                if scene == Some(scenes::REWARD_SCREEN2) {
                    let policy = self.settings.game.claim_click.clone();
                    if self.click_claim(region, &policy) {
                        self.claim_clicked_at = Some(Instant::now());
                        self.stage = Stage::PostClaimHold { index };
                    }
                } else if index == 0 && scene == Some(scenes::REWARD_SCREEN1) {
                    self.press(Key::Enter);
                }
                None
            }

            Stage::PostClaimHold { index } => {
                let hold = Duration::from_millis(self.settings.game.post_claim_hold_ms);
                if self
                    .claim_clicked_at
                    .map_or(false, |t| t.elapsed() < hold)
                {
                    // The grant animation eats clicks; keep the button warm.
                    let policy = self.settings.game.claim_click.clone().with_timeout(200);
                    self.click_claim(region, &policy);
                    return None;
                }
                self.press(Key::Enter);
                sleep_ms(self.settings.timings.key_interval_ms);
                self.press(Key::Enter);
                self.stage = if index + 1 < items.len() {
                    Stage::AwaitRewardReturn { index: index + 1 }
                } else {
                    Stage::AwaitTerminal
                };
                None
            }

            Stage::AwaitRewardReturn { index } => {
                if scene == Some(scenes::TANK_SELECT) {
                    self.stage = Stage::SelectReward { index };
                }
                None
            }

            Stage::AwaitTerminal => {
                if scene.map_or(false, |s| self.is_terminal(s)) {
                    let hold = Duration::from_millis(self.settings.game.terminal_hold_ms);
                    match self.terminal_hold_since {
                        None => {
                            info!("Terminal scene reached, holding for {}ms", hold.as_millis());
                            self.terminal_hold_since = Some(Instant::now());
                        }
                        Some(t) if t.elapsed() >= hold => {
                            self.close_game();
                            return Some(FlowOutcome::Completed {
                                rewards: self.chosen_rewards(),
                            });
                        }
                        _ => {}
                    }
                } else {
                    // The hold must be continuous.
                    self.terminal_hold_since = None;
                    self.press(Key::Enter);
                    sleep_ms(self.settings.timings.think_delay_ms);
                }
                None
            }
        }
    }

    /// Scene-specific stuck recovery.
    fn recover(&mut self, label: &str, region: Rect) {
        match label {
            scenes::TUTORIAL1 => {
                self.press(Key::Enter);
            }
            scenes::CUTSCENE | scenes::VIDEO => {
                self.press(Key::Escape);
            }
            scenes::LOADING | scenes::REWARD_SCREEN3 => {
                // Park the cursor where the upcoming scrolls expect it.
                scroll::move_to_anchor(self.desktop.input.as_mut(), region, &self.settings.scroll);
            }
            scenes::TANK_SELECT => {
                self.recover_tank_select(region);
            }
            scenes::TUTORIAL2 => {
                self.press(Key::Escape);
                sleep_ms(self.settings.timings.step_delay_ms);
                self.desktop.input.move_to(region.center());
                if !self.click_ui(region, names::SKIP_TUTORIAL) {
                    self.click_ui(region, names::SKIP_TUTORIAL_ALT);
                }
                self.classifier_paused = true;
            }
            _ => {}
        }
        sleep_ms(self.settings.timings.step_delay_ms);
    }

    /// Stalled selection screen: confirm an already-selected item, or click
    /// the expected item (current target first), rescanning the whole list
    /// if the icon is not in view. Escape is forbidden on this scene.
    fn recover_tank_select(&mut self, region: Rect) {
        scroll::move_to_anchor(self.desktop.input.as_mut(), region, &self.settings.scroll);
        let items = self.settings.game.rewards.clone();
        if items.is_empty() {
            self.press(Key::Enter);
            return;
        }

        for item in &items {
            if rewards::is_selected(
                self.desktop,
                region,
                self.templates,
                item,
                &self.settings.game.click,
            ) {
                info!("'{}' already selected, confirming", item.id);
                self.press(Key::Enter);
                return;
            }
        }

        let preferred = match self.stage {
            Stage::SelectReward { index }
            | Stage::ConfirmSelection { index }
            | Stage::AwaitClaimScreen { index }
            | Stage::PostClaimHold { index }
            | Stage::AwaitRewardReturn { index } => index.min(items.len() - 1),
            Stage::AwaitTerminal => items.len() - 1,
            _ => 0,
        };
        let mut order: Vec<usize> = vec![preferred];
        order.extend((0..items.len()).filter(|i| *i != preferred));

        for index in order {
            let item = &items[index];
            let clicked = if let Some(p) = rewards::locate_icon(
                self.desktop,
                region,
                self.templates,
                item,
                &self.settings.game.click,
            ) {
                click_many(
                    self.desktop.input.as_mut(),
                    p,
                    self.settings.game.click.clicks,
                    self.settings.game.click.click_interval_ms,
                );
                true
            } else {
                rewards::find_and_click_by_memory(
                    self.desktop,
                    region,
                    self.templates,
                    &self.memory,
                    item,
                    &self.settings.scroll,
                    &self.settings.game.click,
                    self.settings.scroll.rescan_max_steps,
                )
                .is_some()
            };
            if clicked {
                self.chosen.push(item.id.clone());
                self.stage = Stage::ConfirmSelection { index };
                return;
            }
        }
        self.press(Key::Enter);
    }

    fn still_video(&mut self, region: Rect) -> bool {
        let Some(frame) = self.desktop.screen.capture(region) else {
            return false;
        };
        self.classifier
            .classify(&frame)
            .and_then(|m| scenes::normalize(&m.scene))
            .as_deref()
            == Some(scenes::VIDEO)
    }

    fn is_terminal(&self, scene: &str) -> bool {
        self.settings
            .game
            .terminal_scenes
            .iter()
            .any(|s| s == scene)
    }

    fn press(&mut self, key: Key) {
        self.window.focus(self.desktop.windows.as_mut());
        self.desktop.input.press(key);
    }

    fn click_ui(&mut self, region: Rect, name: &str) -> bool {
        let Some(template) = self.templates.get(name).cloned() else {
            debug!("UI template {name} missing");
            return false;
        };
        click_template(self.desktop, region, &template, &self.settings.game.click)
    }

    fn click_claim(&mut self, region: Rect, policy: &crate::config::ClickPolicy) -> bool {
        let Some(template) = self.templates.get(names::CLAIM_REWARD).cloned() else {
            warn!("claim-reward template missing");
            return false;
        };
        self.window.focus(self.desktop.windows.as_mut());
        click_template(self.desktop, region, &template, policy)
    }

    fn close_game(&mut self) {
        if let Some(id) = self.window.resolve(self.desktop.windows.as_mut()) {
            info!("Closing game window {id}");
            self.desktop.windows.close(id);
        }
        self.window.invalidate();
    }

    fn maybe_snapshot(&mut self, frame: &image::RgbaImage) {
        let Some(dir) = self.settings.game.snapshot_dir.as_ref() else {
            return;
        };
        let interval = Duration::from_secs(self.settings.game.snapshot_interval_secs.max(1));
        if self.last_snapshot.map_or(false, |t| t.elapsed() < interval) {
            return;
        }
        self.last_snapshot = Some(Instant::now());
        if let Err(e) = std::fs::create_dir_all(dir) {
            debug!("cannot create snapshot dir: {e}");
            return;
        }
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path = dir.join(format!("game_{stamp}.png"));
        match frame.save(&path) {
            Ok(()) => info!("Saved vision snapshot: {}", path.display()),
            Err(e) => debug!("snapshot save failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    use image::RgbaImage;

    use crate::config::Settings;
    use crate::control::Point;
    use crate::testutil::{
        blit, fast_settings, scene_image, ui_patch, FakeInput, FakeWindows, InputEvent,
        SharedScreen,
    };
    use crate::vision::SceneClassifier;

    const ICON0: u32 = 0;
    const ICON1: u32 = 1;
    const CLAIM: u32 = 2;
    const SKIP: u32 = 3;
    const CONFIRM: u32 = 4;

    const ICON0_POS: (i32, i32) = (30, 40);
    const ICON1_POS: (i32, i32) = (30, 80);
    const CLAIM_POS: (i32, i32) = (60, 60);
    const MENU_BTN_POS: (i32, i32) = (50, 50);

    const ICON0_STEPS: i32 = 3;
    const ICON1_STEPS: i32 = 5;

    /// Scripted game client: scene transitions driven by synthetic input.
    struct GameSim {
        scene: &'static str,
        scroll_pos: i32,
        selected: Option<usize>,
        screen1_enters: u32,
        ack_enters: u32,
        claims_done: usize,
    }

    impl GameSim {
        fn new(initial: &'static str) -> Self {
            Self {
                scene: initial,
                scroll_pos: 0,
                selected: None,
                screen1_enters: 0,
                ack_enters: 0,
                claims_done: 0,
            }
        }

        fn base(scene: &str) -> RgbaImage {
            scene_image(seed_for(scene), 128, 128)
        }

        fn render(&self) -> RgbaImage {
            let mut frame = Self::base(self.scene);
            match self.scene {
                scenes::TANK_SELECT => {
                    if self.scroll_pos == ICON0_STEPS {
                        blit(&mut frame, &ui_patch(ICON0), ICON0_POS.0, ICON0_POS.1);
                    }
                    if self.scroll_pos == ICON1_STEPS {
                        blit(&mut frame, &ui_patch(ICON1), ICON1_POS.0, ICON1_POS.1);
                    }
                }
                scenes::REWARD_SCREEN2 => {
                    blit(&mut frame, &ui_patch(CLAIM), CLAIM_POS.0, CLAIM_POS.1);
                }
                scenes::TUTORIAL_MENU => {
                    blit(&mut frame, &ui_patch(SKIP), MENU_BTN_POS.0, MENU_BTN_POS.1);
                }
                scenes::TUTORIAL_MENU_CONFIRM => {
                    blit(
                        &mut frame,
                        &ui_patch(CONFIRM),
                        MENU_BTN_POS.0,
                        MENU_BTN_POS.1,
                    );
                }
                _ => {}
            }
            frame
        }

        fn near(p: Point, pos: (i32, i32)) -> bool {
            (p.x - (pos.0 + 8)).abs() <= 10 && (p.y - (pos.1 + 8)).abs() <= 10
        }

        fn on_event(&mut self, event: &InputEvent) {
            match (self.scene, event) {
                (scenes::VIDEO, InputEvent::Press(Key::Escape)) => {
                    self.scene = scenes::REWARD_SCREEN1;
                }
                (scenes::TUTORIAL1, InputEvent::Press(Key::Escape)) => {
                    self.scene = scenes::TUTORIAL_MENU;
                }
                (scenes::TUTORIAL_MENU, InputEvent::Click(p)) if Self::near(*p, MENU_BTN_POS) => {
                    self.scene = scenes::TUTORIAL_MENU_CONFIRM;
                }
                (scenes::TUTORIAL_MENU_CONFIRM, InputEvent::Click(p))
                    if Self::near(*p, MENU_BTN_POS) =>
                {
                    self.scene = scenes::VIDEO;
                }
                (scenes::REWARD_SCREEN1, InputEvent::Press(Key::Enter)) => {
                    self.screen1_enters += 1;
                    if self.screen1_enters >= 2 {
                        self.scene = scenes::TANK_SELECT;
                        self.scroll_pos = 0;
                        self.screen1_enters = 0;
                    }
                }
                (scenes::TANK_SELECT, InputEvent::Scroll(amount)) => {
                    self.scroll_pos = (self.scroll_pos - amount / 200).max(0);
                }
                (scenes::TANK_SELECT, InputEvent::Click(p)) => {
                    if self.scroll_pos == ICON0_STEPS && Self::near(*p, ICON0_POS) {
                        self.selected = Some(0);
                    }
                    if self.scroll_pos == ICON1_STEPS && Self::near(*p, ICON1_POS) {
                        self.selected = Some(1);
                    }
                }
                (scenes::TANK_SELECT, InputEvent::Press(Key::Enter)) => {
                    if self.selected.is_some() {
                        self.scene = scenes::REWARD_SCREEN2;
                    }
                }
                (scenes::REWARD_SCREEN2, InputEvent::Click(p)) if Self::near(*p, CLAIM_POS) => {
                    self.scene = scenes::REWARD_SCREEN3;
                    self.ack_enters = 0;
                }
                (scenes::REWARD_SCREEN3, InputEvent::Press(Key::Enter)) => {
                    self.ack_enters += 1;
                    if self.ack_enters >= 2 {
                        self.claims_done += 1;
                        self.selected = None;
                        if self.claims_done >= 2 {
                            self.scene = scenes::HANGAR;
                        } else {
                            self.scene = scenes::TANK_SELECT;
                            self.scroll_pos = 0;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn seed_for(scene: &str) -> u32 {
        match scene {
            scenes::VIDEO => 20,
            scenes::REWARD_SCREEN1 => 21,
            scenes::TANK_SELECT => 22,
            scenes::REWARD_SCREEN2 => 23,
            scenes::REWARD_SCREEN3 => 24,
            scenes::HANGAR => 25,
            scenes::TUTORIAL1 => 26,
            scenes::TUTORIAL_MENU => 27,
            scenes::TUTORIAL_MENU_CONFIRM => 28,
            scenes::LOADING => 29,
            _ => 30,
        }
    }

    const ALL_SCENES: &[&str] = &[
        scenes::VIDEO,
        scenes::REWARD_SCREEN1,
        scenes::TANK_SELECT,
        scenes::REWARD_SCREEN2,
        scenes::REWARD_SCREEN3,
        scenes::HANGAR,
        scenes::TUTORIAL1,
        scenes::TUTORIAL_MENU,
        scenes::TUTORIAL_MENU_CONFIRM,
        scenes::LOADING,
    ];

    /// Write a dataset (scene references + UI crops) into `root`.
    fn write_dataset(root: &Path) {
        for scene in ALL_SCENES {
            let dir = root.join(scene);
            std::fs::create_dir_all(&dir).unwrap();
            GameSim::base(scene).save(dir.join("ref.png")).unwrap();
        }
        let templates = root.join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        ui_patch(ICON0).save(templates.join("is7.png")).unwrap();
        ui_patch(ICON1).save(templates.join("fv4005.png")).unwrap();
        ui_patch(CLAIM)
            .save(templates.join(names::CLAIM_REWARD))
            .unwrap();
        ui_patch(SKIP)
            .save(templates.join(names::SKIP_TUTORIAL))
            .unwrap();
        ui_patch(CONFIRM)
            .save(templates.join(names::SKIP_TUTORIAL_CONFIRM))
            .unwrap();
    }

    struct Harness {
        settings: Settings,
        classifier: SceneClassifier,
        templates: TemplateStore,
        desktop: Desktop,
        sim: Rc<RefCell<GameSim>>,
        windows: Rc<RefCell<FakeWindows>>,
        _dir: tempfile::TempDir,
    }

    fn harness(initial: &'static str) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());

        let mut settings = fast_settings();
        settings.batch.final_dir = dir.path().join("final");
        settings.game.time_budget_secs = 30;

        let classifier = SceneClassifier::from_dataset(dir.path()).unwrap();
        let templates = TemplateStore::new(dir.path().join("templates"));

        let sim = Rc::new(RefCell::new(GameSim::new(initial)));
        let windows = Rc::new(RefCell::new(FakeWindows::new(vec![(
            1,
            "WorldOfTanks client".into(),
        )])));

        let render_sim = sim.clone();
        let screen = SharedScreen {
            source: Rc::new(RefCell::new(move |_region| {
                Some(render_sim.borrow().render())
            })),
        };
        let input_sim = sim.clone();
        let input = FakeInput::observed(Rc::new(RefCell::new(move |event: &InputEvent| {
            input_sim.borrow_mut().on_event(event);
        })));

        let desktop = Desktop::new(
            Box::new(windows.clone()),
            Box::new(screen),
            Box::new(input),
        );
        Harness {
            settings,
            classifier,
            templates,
            desktop,
            sim,
            windows,
            _dir: dir,
        }
    }

    #[test]
    fn test_happy_path_collects_both_rewards() {
        let mut h = harness(scenes::VIDEO);
        let mut flow = GameFlow::new(
            &h.settings,
            &h.classifier,
            &mut h.templates,
            &mut h.desktop,
            ControlFlags::new(),
        );
        let outcome = flow.run();
        assert_eq!(
            outcome,
            FlowOutcome::Completed {
                rewards: vec!["is7".into(), "fv4005".into()]
            }
        );
        // The client window was closed at the end.
        assert_eq!(h.windows.borrow().closed, vec![1]);
        // Scroll offsets were measured and persisted.
        let memory = ScrollMemory::new(h.settings.batch.scroll_memory_dir());
        assert_eq!(memory.read("is7"), ICON0_STEPS as u32);
        assert_eq!(memory.read("fv4005"), ICON1_STEPS as u32);
    }

    #[test]
    fn test_tutorial_account_skips_through() {
        let mut h = harness(scenes::TUTORIAL1);
        let mut flow = GameFlow::new(
            &h.settings,
            &h.classifier,
            &mut h.templates,
            &mut h.desktop,
            ControlFlags::new(),
        );
        let outcome = flow.run();
        assert_eq!(
            outcome,
            FlowOutcome::Completed {
                rewards: vec!["is7".into(), "fv4005".into()]
            }
        );
    }

    #[test]
    fn test_time_budget_expiry_is_not_success() {
        let mut h = harness(scenes::LOADING);
        h.settings.game.time_budget_secs = 1;
        let mut flow = GameFlow::new(
            &h.settings,
            &h.classifier,
            &mut h.templates,
            &mut h.desktop,
            ControlFlags::new(),
        );
        assert_eq!(flow.run(), FlowOutcome::TimeBudgetExpired);
    }

    #[test]
    fn test_stop_flag_aborts() {
        let mut h = harness(scenes::VIDEO);
        let flags = ControlFlags::new();
        flags.request_stop();
        let mut flow = GameFlow::new(
            &h.settings,
            &h.classifier,
            &mut h.templates,
            &mut h.desktop,
            flags,
        );
        assert_eq!(flow.run(), FlowOutcome::Stopped);
    }

    #[test]
    fn test_phase_gating_blocks_out_of_phase_scenes() {
        // The selection screen shown while still in the pre phase must be
        // ignored: no stage transition, no reward clicks.
        let mut h = harness(scenes::TANK_SELECT);
        h.sim.borrow_mut().scroll_pos = ICON0_STEPS;
        h.settings.game.time_budget_secs = 1;
        let mut flow = GameFlow::new(
            &h.settings,
            &h.classifier,
            &mut h.templates,
            &mut h.desktop,
            ControlFlags::new(),
        );
        let outcome = flow.run();
        assert_eq!(outcome, FlowOutcome::TimeBudgetExpired);
        assert_eq!(flow.phase(), Phase::Pre);
        assert_eq!(flow.stage(), Stage::SkipIntro);
        assert!(flow.chosen_rewards().is_empty());
    }

    #[test]
    fn test_early_terminal_scene_means_already_collected() {
        let mut h = harness(scenes::HANGAR);
        let mut flow = GameFlow::new(
            &h.settings,
            &h.classifier,
            &mut h.templates,
            &mut h.desktop,
            ControlFlags::new(),
        );
        let outcome = flow.run();
        assert_eq!(outcome, FlowOutcome::Completed { rewards: vec![] });
        assert_eq!(h.windows.borrow().closed, vec![1]);
    }

    #[test]
    fn test_chosen_rewards_are_deduplicated_in_order() {
        let mut h = harness(scenes::VIDEO);
        let mut flow = GameFlow::new(
            &h.settings,
            &h.classifier,
            &mut h.templates,
            &mut h.desktop,
            ControlFlags::new(),
        );
        flow.chosen = vec![
            "is7".into(),
            "fv4005".into(),
            "is7".into(),
            "fv4005".into(),
        ];
        assert_eq!(
            flow.chosen_rewards(),
            vec!["is7".to_string(), "fv4005".to_string()]
        );
    }
}
