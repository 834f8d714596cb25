//! wot-harvest - vision-driven World of Tanks launcher automation
//!
//! This library drives a third-party game launcher and client through a
//! scripted reward-collection sequence: it classifies what is on screen by
//! perceptual image hashing, reacts to scene transitions with two staged
//! state machines (launcher login and in-game reward collection), and
//! recovers from frozen screens with scene-specific actions.
//!
//! Window discovery, screen capture and raw input injection are consumed
//! through the traits in [`control`]; a native backend lives behind the
//! `desktop` cargo feature.

pub mod accounts;
pub mod config;
pub mod control;
pub mod game;
pub mod launcher;
pub mod runner;
pub mod vision;

#[cfg(test)]
pub(crate) mod testutil;

pub use accounts::Credentials;
pub use config::Settings;
pub use control::{ControlFlags, Desktop};
pub use game::{FlowOutcome, GameFlow};
pub use launcher::{LoginError, LoginFlow};
pub use runner::AccountOutcome;
pub use vision::{SceneClassifier, SceneMatch};
