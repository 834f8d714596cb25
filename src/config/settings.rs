//! User settings for the automation flows
//!
//! Defines all configurable options: polling cadence, stuck threshold,
//! click/retry policies, scroll behavior, reward items, terminal scenes and
//! batch processing. Everything has a sensible default; a JSON settings
//! file can override any subset.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Main settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dataset locations
    pub dataset: DatasetSettings,
    /// Window title fragments for launcher and game client
    pub windows: WindowSettings,
    /// Launcher login flow tunables
    pub launcher: LauncherSettings,
    /// In-game flow tunables
    pub game: GameSettings,
    /// Scrollable-list behavior
    pub scroll: ScrollSettings,
    /// Stuck detection
    pub stuck: StuckSettings,
    /// Shared timing settings
    pub timings: TimingSettings,
    /// Batch (multi-account) processing
    pub batch: BatchSettings,
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        serde_json::from_str(&raw).map_err(|e| SettingsError::Parse(path.to_path_buf(), e))
    }

    /// Write settings to a JSON file (pretty-printed).
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| SettingsError::Parse(path.to_path_buf(), e))?;
        std::fs::write(path, raw).map_err(|e| SettingsError::Io(path.to_path_buf(), e))
    }
}

/// Settings file errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot access settings file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("cannot parse settings file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
}

/// Dataset locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    /// Root directory with one subdirectory per scene
    pub root: PathBuf,
    /// Directory with small UI-element crops
    pub templates: PathBuf,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            templates: PathBuf::from("dataset/templates"),
        }
    }
}

/// Window title fragments (case-insensitive substring match).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub launcher_titles: Vec<String>,
    pub client_titles: Vec<String>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            launcher_titles: vec![
                "wargaming game center".into(),
                "game center".into(),
                "world of tanks".into(),
            ],
            client_titles: vec!["worldoftanks".into(), "wot client".into()],
        }
    }
}

/// Launcher login flow tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Relative position of the avatar button
    pub avatar: (f32, f32),
    /// Relative position of the Play button fallback
    pub play_button: (f32, f32),
    /// Relative position of the "add account" entry
    pub add_account: (f32, f32),
    /// Relative fallback for the logout confirmation "continue" button
    pub logout_continue: (f32, f32),
    /// Relative fallback for the email field when its template is missing
    pub email_field: (f32, f32),
    /// Relative fallback for the password field
    pub password_field: (f32, f32),
    /// Relative fallback for the login button
    pub login_button: (f32, f32),
    /// Pixels right of the avatar to hover before scrolling the account list
    pub avatar_scroll_dx: i32,
    /// Wheel amount for one account-list scroll
    pub logout_scroll_amount: i32,
    /// Bounded attempts to find the logout entry while scrolling
    pub max_scroll_tries: u32,
    /// Ticks of the scene-driven login loop before giving up
    pub state_loop_ticks: u32,
    /// Probes for the login-error indicator after submitting
    pub login_error_checks: u32,
    /// Interval between login-error probes (ms)
    pub login_error_interval_ms: u64,
    /// Probes for the Play button after returning to the main menu
    pub play_button_checks: u32,
    /// How long to wait for the game client window after Play (ms)
    pub game_window_timeout_ms: u64,
    /// Interval between game-window probes (ms)
    pub game_window_interval_ms: u64,
    /// Hover time on the Play button before clicking (ms)
    pub play_hover_ms: u64,
    /// Wait after clicking the avatar (ms)
    pub avatar_settle_ms: u64,
    /// Template search ladder for launcher UI elements
    pub locate: ClickPolicy,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            avatar: (0.04, 0.12),
            play_button: (0.16, 0.90),
            add_account: (0.16, 0.96),
            logout_continue: (0.42, 0.82),
            email_field: (0.40, 0.28),
            password_field: (0.40, 0.36),
            login_button: (0.55, 0.44),
            avatar_scroll_dx: 50,
            logout_scroll_amount: -1600,
            max_scroll_tries: 5,
            state_loop_ticks: 90,
            login_error_checks: 10,
            login_error_interval_ms: 200,
            play_button_checks: 10,
            game_window_timeout_ms: 30_000,
            game_window_interval_ms: 500,
            play_hover_ms: 1000,
            avatar_settle_ms: 1000,
            locate: ClickPolicy::locate(),
        }
    }
}

/// One selectable reward item and the template files describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    /// Stable identifier, also the scroll-memory key
    pub id: String,
    /// Icon crop file name in the templates directory
    pub icon: String,
    /// Alternative (trimmed) icon crop, used when the full icon is occluded
    pub alt_icon: Option<String>,
    /// Marker crop shown when the item is already selected
    pub selected_marker: String,
}

impl RewardItem {
    /// Conventional template names derived from the id.
    pub fn named(id: &str) -> Self {
        Self {
            id: id.to_string(),
            icon: format!("{id}.png"),
            alt_icon: Some(format!("{id}_trimmed.png")),
            selected_marker: format!("{id}_selected.png"),
        }
    }
}

/// In-game flow tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Reward items to select, in order
    pub rewards: Vec<RewardItem>,
    /// Scenes that mean the flow is done
    pub terminal_scenes: Vec<String>,
    /// Wall-clock budget for one in-game run (seconds)
    pub time_budget_secs: u64,
    /// How long the terminal scene must hold before success (ms)
    pub terminal_hold_ms: u64,
    /// Sightings of a terminal scene outside the post phase that mean the
    /// account already collected its rewards
    pub early_terminal_sightings: u32,
    /// Pause after clicking the claim button before confirming (ms)
    pub post_claim_hold_ms: u64,
    /// Wait after pressing Enter on a tutorial scene before the mechanical
    /// skip sequence (ms)
    pub tutorial_skip_delay_ms: u64,
    /// Wait between the two game-window spawn phases (ms)
    pub spawn_wait_ms: u64,
    /// Aggressive click policy for generic UI buttons
    pub click: ClickPolicy,
    /// Click policy for the claim-reward button (lower thresholds)
    pub claim_click: ClickPolicy,
    /// Save what the bot sees to this directory (disabled when `None`)
    pub snapshot_dir: Option<PathBuf>,
    /// Seconds between snapshots
    pub snapshot_interval_secs: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            rewards: vec![RewardItem::named("is7"), RewardItem::named("fv4005")],
            terminal_scenes: vec!["game_hangar".into(), "game_reward_code".into()],
            time_budget_secs: 300,
            terminal_hold_ms: 5000,
            early_terminal_sightings: 3,
            post_claim_hold_ms: 5000,
            tutorial_skip_delay_ms: 3000,
            spawn_wait_ms: 5000,
            click: ClickPolicy::aggressive(),
            claim_click: ClickPolicy::reward(),
            snapshot_dir: None,
            snapshot_interval_secs: 5,
        }
    }
}

/// Scrollable-list behavior for reward selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollSettings {
    /// Wheel amount for one downward probe step
    pub step_units: i32,
    /// Probe steps during a first-time measurement
    pub max_steps: u32,
    /// Probe steps during a stuck-recovery full rescan
    pub rescan_max_steps: u32,
    /// Upward steps used to return to the top of the list
    pub top_steps: u32,
    /// Wheel amount for one upward step
    pub top_units: i32,
    /// Delay between rapid scroll steps (ms)
    pub rapid_delay_ms: u64,
    /// Wait for inertial scrolling to settle before re-locating (ms)
    pub settle_ms: u64,
    /// Relative anchor the cursor parks at while scrolling
    pub anchor: (f32, f32),
    /// Pixels left of the anchor to avoid hover tooltips
    pub anchor_left_shift: i32,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            step_units: 200,
            max_steps: 60,
            rescan_max_steps: 80,
            top_steps: 40,
            top_units: 600,
            rapid_delay_ms: 15,
            settle_ms: 2000,
            anchor: (0.5, 0.75),
            anchor_left_shift: 200,
        }
    }
}

/// Stuck detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckSettings {
    /// Consecutive identical classifications that count as stuck
    pub threshold: u32,
}

impl Default for StuckSettings {
    fn default() -> Self {
        Self { threshold: 10 }
    }
}

/// Shared timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Scene polling interval (ms)
    pub poll_interval_ms: u64,
    /// Pause before a planned action so the UI settles (ms)
    pub think_delay_ms: u64,
    /// Pause between consecutive synthetic inputs (ms)
    pub step_delay_ms: u64,
    /// Short pause between key presses in a combo (ms)
    pub key_interval_ms: u64,
    /// Sleep while the pause flag is set (ms)
    pub pause_sleep_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            think_delay_ms: 400,
            step_delay_ms: 200,
            key_interval_ms: 150,
            pause_sleep_ms: 200,
        }
    }
}

/// Template click/retry policy: confidence ladders, scale sweep and click
/// behavior, all bounded by a deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickPolicy {
    /// Total time to keep probing (ms)
    pub timeout_ms: u64,
    /// Pause between probe rounds (ms)
    pub probe_interval_ms: u64,
    /// Color-match confidences, tried high to low each round
    pub confidences: Vec<f32>,
    /// Grayscale-match confidences, tried after color
    pub grayscale_confidences: Vec<f32>,
    /// Confidence ladder for the multi-scale fallback
    pub scaled_confidences: Vec<f32>,
    /// Resize factors for the multi-scale fallback
    pub scales: Vec<f32>,
    /// Clicks fired on a hit
    pub clicks: u32,
    /// Pause between those clicks (ms)
    pub click_interval_ms: u64,
}

impl Default for ClickPolicy {
    fn default() -> Self {
        Self::aggressive()
    }
}

impl ClickPolicy {
    /// General-purpose aggressive policy: descending thresholds, both
    /// color modes, multi-scale fallback, double click.
    pub fn aggressive() -> Self {
        Self {
            timeout_ms: 1600,
            probe_interval_ms: 60,
            confidences: vec![0.86],
            grayscale_confidences: vec![0.82, 0.78],
            scaled_confidences: vec![0.86, 0.82, 0.78, 0.74],
            scales: vec![1.00, 0.97, 1.03, 0.94],
            clicks: 2,
            click_interval_ms: 60,
        }
    }

    /// Claim-button policy: lower thresholds, slightly longer deadline.
    pub fn reward() -> Self {
        Self {
            timeout_ms: 1800,
            probe_interval_ms: 60,
            confidences: vec![0.83],
            grayscale_confidences: vec![0.78],
            scaled_confidences: vec![0.78, 0.74, 0.70],
            scales: vec![1.00, 0.97, 1.03, 0.94],
            clicks: 2,
            click_interval_ms: 60,
        }
    }

    /// Pure location ladder used by the launcher flow; no scale sweep, a
    /// single probe round, single click.
    pub fn locate() -> Self {
        Self {
            timeout_ms: 0,
            probe_interval_ms: 0,
            confidences: vec![0.86, 0.84, 0.80],
            grayscale_confidences: vec![0.84, 0.80, 0.75],
            scaled_confidences: vec![],
            scales: vec![],
            clicks: 1,
            click_interval_ms: 0,
        }
    }

    /// Same policy with a different deadline.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Batch (multi-account) processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Pending accounts file
    pub accounts_file: PathBuf,
    /// Directory for processed-account buckets and scroll memory
    pub final_dir: PathBuf,
    /// Extra attempts after a hung/crashed child or a game-start timeout
    pub attempt_retries: u32,
    /// Extra seconds on top of the game time budget before a child is
    /// considered hung and killed
    pub child_grace_secs: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            accounts_file: PathBuf::from("accounts.txt"),
            final_dir: PathBuf::from("accounts_final"),
            attempt_retries: 2,
            child_grace_secs: 120,
        }
    }
}

impl BatchSettings {
    /// Directory holding per-reward-item scroll memory files.
    pub fn scroll_memory_dir(&self) -> PathBuf {
        self.final_dir.join("tank_scrolls")
    }
}
