//! Request/response DTOs for the API

use serde::{Deserialize, Serialize};

use tandem_core::actions::ActionSummary;
use tandem_core::orchestrator::TurnUsage;
use tandem_core::phases::PlanningPhase;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    pub tenant_id: Option<String>,
    pub project_id: Option<String>,
    pub card_id: Option<String>,
    pub agent: Option<String>,
    /// Closed phase enum value; anything else is a 400.
    pub phase: Option<String>,
    pub complexity: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub conversation_id: String,
    pub phase: PlanningPhase,
    pub phase_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_phase: Option<PlanningPhase>,
    pub actions: ActionSummary,
    pub usage: TurnUsage,
}

#[derive(Debug, Deserialize)]
pub struct GenerateDocumentRequest {
    pub project_id: String,
    pub document_type: String,
    #[serde(default)]
    pub create_review_card: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateDocumentResponse {
    pub document_id: String,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_card_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewTransitionRequest {
    pub card_id: String,
    /// Target review state: pending, in_review, approved, rejected.
    pub state: String,
    pub actor: Option<String>,
    pub reason: Option<String>,
}
