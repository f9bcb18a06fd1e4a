//! Conversation-turn endpoint

use axum::{extract::State, routing::post, Json, Router};

use tandem_core::phases::PlanningPhase;
use tandem_core::prompt::Complexity;
use tandem_core::ChatTurnRequest;

use crate::error::AppError;
use crate::types::{ChatRequest, ChatResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat_turn))
}

/// Handle one conversation turn: guidance, model call, directive
/// execution, phase detection. The reply is returned even when actions
/// partially fail; failures ride in `actions.errors`.
async fn chat_turn(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    // Unknown phase values are rejected at the boundary
    let phase = req
        .phase
        .as_deref()
        .map(|p| p.parse::<PlanningPhase>())
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let complexity = match req.complexity.as_deref() {
        None => Complexity::default(),
        Some("simple") => Complexity::Simple,
        Some("moderate") => Complexity::Moderate,
        Some("complex") => Complexity::Complex,
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown complexity '{other}'")));
        }
    };

    let result = state
        .orchestrator
        .handle_turn(ChatTurnRequest {
            message: req.message,
            conversation_id: req.conversation_id,
            tenant_id: req.tenant_id.unwrap_or_else(|| "default".into()),
            project_id: req.project_id,
            card_id: req.card_id,
            agent: req.agent,
            phase,
            complexity,
            metadata: req.metadata,
        })
        .await?;

    Ok(Json(ChatResponse {
        reply: result.reply,
        conversation_id: result.conversation_id,
        phase: result.phase,
        phase_complete: result.phase_complete,
        next_phase: result.next_phase,
        actions: result.actions,
        usage: result.usage,
    }))
}
