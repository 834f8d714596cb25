//! Vision module
//!
//! Scene classification by perceptual hashing, UI-element location by
//! template correlation, and the stuck detector that watches the
//! classification stream for liveness.

pub mod classifier;
pub mod locate;
pub mod stuck;
pub mod templates;

pub use classifier::{SceneClassifier, SceneMatch};
pub use locate::{locate_in, locate_scaled, LocateOptions};
pub use stuck::StuckDetector;
pub use templates::TemplateStore;

use std::path::PathBuf;

/// Vision subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("failed to read dataset root {0}: {1}")]
    DatasetUnreadable(PathBuf, std::io::Error),
    #[error("no scene templates loaded from {0}")]
    EmptyDataset(PathBuf),
}
