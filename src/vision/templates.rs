//! UI-element template store
//!
//! Small button/field crops live in the reserved `templates` subdirectory of
//! the dataset (they are UI elements, not scenes). They are loaded on first
//! use and cached; a missing or undecodable file is remembered as absent so
//! the probe loops do not hammer the filesystem.

use std::collections::HashMap;
use std::path::PathBuf;

use image::RgbaImage;
use log::debug;

/// Well-known template file names. The dataset directory is the contract;
/// these constants just keep the call sites typo-free.
pub mod names {
    pub const LOGOUT: &str = "logout.png";
    pub const DISMISS: &str = "close_x.png";
    pub const CONTINUE: &str = "continue.png";
    pub const EMAIL_FIELD: &str = "email.png";
    pub const PASSWORD_FIELD: &str = "password.png";
    pub const LOGIN_BUTTON: &str = "login_btn.png";
    pub const LOGIN_ERROR: &str = "login_error.png";
    pub const PLAY_BUTTON: &str = "play_btn.png";
    pub const SKIP_TUTORIAL: &str = "skip_tutorial.png";
    pub const SKIP_TUTORIAL_ALT: &str = "skip_tutorial_alt.png";
    pub const SKIP_TUTORIAL_CONFIRM: &str = "skip_tutorial_confirm.png";
    pub const CLAIM_REWARD: &str = "claim_reward.png";
}

/// Lazy cache of UI-element crops keyed by file name.
pub struct TemplateStore {
    dir: PathBuf,
    cache: HashMap<String, Option<RgbaImage>>,
}

impl TemplateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            cache: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Fetch a template by file name; `None` if the file is missing or
    /// cannot be decoded.
    pub fn get(&mut self, name: &str) -> Option<&RgbaImage> {
        let dir = &self.dir;
        self.cache
            .entry(name.to_string())
            .or_insert_with(|| {
                let path = dir.join(name);
                match image::open(&path) {
                    Ok(img) => Some(img.to_rgba8()),
                    Err(e) => {
                        debug!("UI template {} unavailable: {e}", path.display());
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Fetch the first available template out of several candidates.
    pub fn first_of(&mut self, candidates: &[&str]) -> Option<RgbaImage> {
        for name in candidates {
            if let Some(img) = self.get(name) {
                return Some(img.clone());
            }
        }
        None
    }
}
