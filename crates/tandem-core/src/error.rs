//! Domain error taxonomy
//!
//! Errors the caller must discriminate on live here; general plumbing
//! failures use `anyhow::Error` and bubble up through `Result`.

use thiserror::Error;

/// Errors with defined user-visible semantics.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Agent exists but may not operate in the requested lane.
    /// Never auto-corrected by rerouting to a different agent.
    #[error("agent '{agent}' is not allowed in lane {lane}")]
    AgentNotAllowedInLane { agent: String, lane: i64 },

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    /// A required identifier (project, board) was absent from the
    /// execution context. Reported with zero side effects.
    #[error("missing {0} in execution context")]
    MissingContext(&'static str),

    #[error("lane {0} not found on board")]
    LaneNotFound(i64),

    #[error("card '{0}' not found")]
    CardNotFound(String),

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("unknown document type '{0}'")]
    UnknownDocumentType(String),

    #[error("unknown phase '{0}'")]
    UnknownPhase(String),

    #[error("unknown review state '{0}'")]
    UnknownReviewState(String),

    #[error("invalid review transition: {from} -> {to}")]
    InvalidReviewTransition { from: String, to: String },

    /// The model call itself failed or returned no usable content.
    /// The core performs no automatic retry.
    #[error("model provider error: {0}")]
    Provider(String),
}
