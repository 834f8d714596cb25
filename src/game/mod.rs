//! In-game automation
//!
//! Phase gating, the staged reward-collection flow, reward-item search
//! with persisted scroll memory, and scene-keyed stuck recovery.

pub mod flow;
pub mod phase;
pub mod rewards;
pub mod scenes;
pub mod scroll;

pub use flow::{FlowOutcome, GameFlow, Stage};
pub use phase::Phase;
pub use scroll::ScrollMemory;
