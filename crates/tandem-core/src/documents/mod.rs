//! Document lifecycle and review-card state machine
//!
//! Planning documents (blueprint, PRD, MVP, playbook) are versioned per
//! project. Each document's promotion is gated by a review card whose
//! status walks a small state machine; every transition is appended to the
//! card's audit history.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::gateway::{CallOptions, ExecutionGateway, ModelMessage, Role};
use crate::storage::{BoardStore, Database, DocumentStore, NewCard, ProjectStore};

/// Lane review cards are created in.
const REVIEW_LANE: i64 = 8;

/// Closed set of planning document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Blueprint,
    Prd,
    Mvp,
    Playbook,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Blueprint,
        DocumentType::Prd,
        DocumentType::Mvp,
        DocumentType::Playbook,
    ];

    pub fn display_title(self) -> &'static str {
        match self {
            DocumentType::Blueprint => "Blueprint",
            DocumentType::Prd => "PRD",
            DocumentType::Mvp => "MVP Plan",
            DocumentType::Playbook => "Playbook",
        }
    }

    /// System prompt for generating this document type.
    fn generation_prompt(self) -> &'static str {
        match self {
            DocumentType::Blueprint => {
                "Write the project blueprint: problem statement, vision, component \
                 architecture, and the major decisions with their rationale. Use \
                 markdown headings. Be specific; avoid boilerplate."
            }
            DocumentType::Prd => {
                "Write the product requirements document: user stories, functional \
                 and non-functional requirements, and acceptance criteria. Use \
                 markdown headings and numbered requirements."
            }
            DocumentType::Mvp => {
                "Write the MVP plan: the smallest coherent feature set, what is \
                 deliberately deferred, and the build order. Use markdown headings."
            }
            DocumentType::Playbook => {
                "Write the delivery playbook: launch steps, operational runbook, \
                 and rollback procedure. Use markdown headings and checklists."
            }
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentType::Blueprint => "blueprint",
            DocumentType::Prd => "prd",
            DocumentType::Mvp => "mvp",
            DocumentType::Playbook => "playbook",
        };
        f.write_str(s)
    }
}

impl FromStr for DocumentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blueprint" => Ok(DocumentType::Blueprint),
            "prd" => Ok(DocumentType::Prd),
            "mvp" => Ok(DocumentType::Mvp),
            "playbook" => Ok(DocumentType::Playbook),
            other => Err(CoreError::UnknownDocumentType(other.to_string())),
        }
    }
}

/// Review-card status. `Rejected` loops back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    None,
    Pending,
    InReview,
    Approved,
    Rejected,
}

impl ReviewState {
    pub fn can_transition(self, next: ReviewState) -> bool {
        matches!(
            (self, next),
            (ReviewState::None, ReviewState::Pending)
                | (ReviewState::Pending, ReviewState::InReview)
                | (ReviewState::InReview, ReviewState::Approved)
                | (ReviewState::InReview, ReviewState::Rejected)
                | (ReviewState::Rejected, ReviewState::Pending)
        )
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewState::None => "none",
            ReviewState::Pending => "pending",
            ReviewState::InReview => "in_review",
            ReviewState::Approved => "approved",
            ReviewState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for ReviewState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ReviewState::None),
            "pending" => Ok(ReviewState::Pending),
            "in_review" => Ok(ReviewState::InReview),
            "approved" => Ok(ReviewState::Approved),
            "rejected" => Ok(ReviewState::Rejected),
            other => Err(CoreError::UnknownReviewState(other.to_string())),
        }
    }
}

/// Sink for rendered document copies. Writes are best-effort: a failure is
/// reported but never rolls back the stored version.
pub trait DocumentSink: Send + Sync {
    fn write_document(&self, project_id: &str, doc_type: DocumentType, content: &str)
        -> Result<()>;
}

/// Filesystem document sink: `<root>/<project_id>/<doc_type>.md`.
pub struct FsDocumentSink {
    root: PathBuf,
}

impl FsDocumentSink {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl DocumentSink for FsDocumentSink {
    fn write_document(
        &self,
        project_id: &str,
        doc_type: DocumentType,
        content: &str,
    ) -> Result<()> {
        let dir = self.root.join(project_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(format!("{doc_type}.md")), content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub document_id: String,
    pub version: i64,
    pub review_card_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    pub create_review_card: bool,
}

/// Opens a connection per unit of work, like `UsageStore`; no connection
/// is ever held across the model call.
pub struct DocumentLifecycle<'a> {
    db_path: &'a Path,
    sink: Option<&'a dyn DocumentSink>,
}

impl<'a> DocumentLifecycle<'a> {
    pub fn new(db_path: &'a Path, sink: Option<&'a dyn DocumentSink>) -> Self {
        Self { db_path, sink }
    }

    /// Generate (or regenerate, incrementing version) the document for
    /// (project, type), and walk its review card to `pending`.
    pub async fn generate(
        &self,
        gateway: &ExecutionGateway,
        project_id: &str,
        doc_type: DocumentType,
        options: GenerateOptions,
    ) -> Result<GeneratedDocument> {
        let request = {
            let db = Database::new(self.db_path)?;
            self.generation_request(&db, project_id, doc_type)?
        };

        let messages = [ModelMessage {
            role: Role::User,
            content: request,
        }];
        let execution = gateway
            .execute(
                "orchestrator",
                None,
                doc_type.generation_prompt(),
                &messages,
                &CallOptions::default(),
            )
            .await?;
        let content = execution.content;

        let db = Database::new(self.db_path)?;
        let (document_id, version) =
            DocumentStore::new(&db).append_version(project_id, doc_type, &content)?;

        let review_card_id = if options.create_review_card {
            match self.ensure_review_card(&db, project_id, doc_type, version) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("review card setup failed for {doc_type}: {e}");
                    None
                }
            }
        } else {
            None
        };

        if let Some(sink) = self.sink {
            if let Err(e) = sink.write_document(project_id, doc_type, &content) {
                tracing::warn!("document export failed for {doc_type} (version kept): {e}");
            }
        }

        Ok(GeneratedDocument {
            document_id,
            version,
            review_card_id,
        })
    }

    /// User prompt for the generation call. Prior documents feed the next
    /// one: the PRD builds on the blueprint, the MVP plan on both, and so
    /// on.
    fn generation_request(
        &self,
        db: &Database,
        project_id: &str,
        doc_type: DocumentType,
    ) -> Result<String> {
        let project = ProjectStore::new(db)
            .get(project_id)?
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))?;

        let mut context = format!("Project: {}\n", project.name);
        for doc in DocumentStore::new(db).latest_for_project(project_id)? {
            context.push_str(&format!(
                "\n## Existing {} (v{})\n{}\n",
                doc.doc_type, doc.version, doc.content
            ));
        }

        Ok(format!(
            "{context}\nGenerate the {} for this project.",
            doc_type.display_title()
        ))
    }

    /// Look up or create the review card gating this document type, then
    /// reset it to `pending` for the new version. A card already pending
    /// is left untouched; no audit row for a status that did not change.
    fn ensure_review_card(
        &self,
        db: &Database,
        project_id: &str,
        doc_type: DocumentType,
        version: i64,
    ) -> Result<Option<String>> {
        let store = BoardStore::new(db);
        let Some(board_id) = store.board_for_project(project_id)? else {
            tracing::warn!("project {project_id} has no board; skipping review card");
            return Ok(None);
        };

        let reason = format!("document version {version} generated");

        if let Some(card) = store.find_review_card(&board_id, &doc_type.to_string())? {
            if card.status != "pending" {
                store.set_card_field(&card.id, "status", "pending")?;
                store.record_history(
                    &card.id,
                    "status",
                    Some(&card.status),
                    Some("pending"),
                    "system",
                    &reason,
                )?;
            }
            return Ok(Some(card.id));
        }

        let Some(lane) = store.find_lane(&board_id, REVIEW_LANE)? else {
            return Err(CoreError::LaneNotFound(REVIEW_LANE).into());
        };

        let card = NewCard {
            title: format!("Review: {}", doc_type.display_title()),
            description: format!("Gates promotion of the {} document.", doc_type.display_title()),
            card_type: "review".into(),
            doc_type: Some(doc_type.to_string()),
            priority: "high".into(),
            status: "pending".into(),
            ..Default::default()
        };
        let card_id = store.insert_card(&board_id, &lane.id, &card)?;
        store.record_history(&card_id, "status", Some("none"), Some("pending"), "system", &reason)?;

        Ok(Some(card_id))
    }

    /// Advance a review card through its state machine.
    ///
    /// Invalid transitions are rejected; valid ones update the card status
    /// and append one audit entry.
    pub fn transition_review(
        &self,
        card_id: &str,
        to: ReviewState,
        actor: &str,
        reason: &str,
    ) -> Result<()> {
        let db = Database::new(self.db_path)?;
        let store = BoardStore::new(&db);
        let card = store
            .get_card(card_id)?
            .ok_or_else(|| CoreError::CardNotFound(card_id.to_string()))?;

        let from: ReviewState = card.status.parse()?;
        if !from.can_transition(to) {
            return Err(CoreError::InvalidReviewTransition {
                from: from.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        store.set_card_field(card_id, "status", &to.to_string())?;
        store.record_history(
            card_id,
            "status",
            Some(&from.to_string()),
            Some(&to.to_string()),
            actor,
            reason,
        )?;

        Ok(())
    }
}
