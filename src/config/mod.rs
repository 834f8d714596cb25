//! Configuration module
//!
//! All tunables for the automation flows.

pub mod settings;

pub use settings::{
    BatchSettings, ClickPolicy, GameSettings, LauncherSettings, RewardItem, ScrollSettings,
    Settings, SettingsError, StuckSettings, TimingSettings, WindowSettings,
};
