//! Tandem core
//!
//! Coordinates a multi-phase planning conversation between a human
//! operator and specialist AI agents, turning model output into structured
//! cards on a lane-based board and into versioned planning documents.

pub mod actions;
pub mod agents;
pub mod documents;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod phases;
pub mod prompt;
pub mod storage;

pub use error::CoreError;
pub use orchestrator::{ChatTurnRequest, ChatTurnResult, Orchestrator};
