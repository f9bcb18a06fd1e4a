//! Document generation, retrieval, and review transitions

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use tandem_core::documents::{
    DocumentLifecycle, DocumentType, GenerateOptions, ReviewState,
};
use tandem_core::storage::{Database, DocumentRecord, DocumentStore};

use crate::error::AppError;
use crate::types::{
    GenerateDocumentRequest, GenerateDocumentResponse, ReviewTransitionRequest,
};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate_document))
        .route("/review", post(transition_review))
        .route("/:project_id/:doc_type", get(get_latest))
}

async fn generate_document(
    State(state): State<AppState>,
    Json(req): Json<GenerateDocumentRequest>,
) -> Result<Json<GenerateDocumentResponse>, AppError> {
    let doc_type: DocumentType = req
        .document_type
        .parse()
        .map_err(|e: tandem_core::CoreError| AppError::BadRequest(e.to_string()))?;

    let lifecycle = DocumentLifecycle::new(&state.db_path, state.document_sink.as_deref());

    let generated = lifecycle
        .generate(
            &state.gateway,
            &req.project_id,
            doc_type,
            GenerateOptions {
                create_review_card: req.create_review_card,
            },
        )
        .await?;

    Ok(Json(GenerateDocumentResponse {
        document_id: generated.document_id,
        version: generated.version,
        review_card_id: generated.review_card_id,
    }))
}

async fn get_latest(
    State(state): State<AppState>,
    Path((project_id, doc_type)): Path<(String, String)>,
) -> Result<Json<DocumentRecord>, AppError> {
    let doc_type: DocumentType = doc_type
        .parse()
        .map_err(|e: tandem_core::CoreError| AppError::BadRequest(e.to_string()))?;

    let db = Database::new(&state.db_path)?;
    let document = DocumentStore::new(&db)
        .latest(&project_id, doc_type)?
        .ok_or_else(|| {
            AppError::NotFound(format!("no {doc_type} document for project {project_id}"))
        })?;

    Ok(Json(document))
}

async fn transition_review(
    State(state): State<AppState>,
    Json(req): Json<ReviewTransitionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let to: ReviewState = req
        .state
        .parse()
        .map_err(|e: tandem_core::CoreError| AppError::BadRequest(e.to_string()))?;

    DocumentLifecycle::new(&state.db_path, None).transition_review(
        &req.card_id,
        to,
        req.actor.as_deref().unwrap_or("operator"),
        req.reason.as_deref().unwrap_or(""),
    )?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
