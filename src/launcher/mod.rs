//! Launcher automation
//!
//! Window visibility bootstrap and the scene-driven login flow.

pub mod login;
pub mod visibility;

pub use login::{LoginError, LoginFlow};
pub use visibility::ensure_launcher_visible;
