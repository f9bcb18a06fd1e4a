//! Conversation-turn orchestrator
//!
//! Drives one chat turn end to end: conversation bookkeeping, phase
//! guidance, budgeted prompt assembly, the model call, directive
//! extraction and execution, and phase-advance detection. The reply is
//! always returned even when action execution partially or fully fails;
//! action failures ride alongside it, never in place of it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::actions::{parse_actions, ActionExecutor, ActionSummary};
use crate::agents::{AgentRegistry, AgentRoutingTable, BASELINE_AGENT};
use crate::documents::{DocumentLifecycle, DocumentSink, DocumentType, GenerateOptions};
use crate::error::CoreError;
use crate::gateway::{CallOptions, ExecutionGateway, ModelMessage, Role};
use crate::phases::{detect_phase_signal, PlanningPhase};
use crate::prompt::{Complexity, PromptBuilder, PromptRequest};
use crate::storage::{
    BoardStore, ConversationStore, Database, MessageRole, ProjectStore,
};

/// Messages of prior history included in the model conversation.
const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct ChatTurnRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    pub tenant_id: String,
    pub project_id: Option<String>,
    pub card_id: Option<String>,
    /// Defaults to the baseline agent when absent.
    pub agent: Option<String>,
    /// Defaults to the project's persisted phase, else `welcome`.
    pub phase: Option<PlanningPhase>,
    pub complexity: Complexity,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub price: f64,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurnResult {
    pub reply: String,
    pub conversation_id: String,
    pub phase: PlanningPhase,
    pub phase_complete: bool,
    pub next_phase: Option<PlanningPhase>,
    pub actions: ActionSummary,
    pub usage: TurnUsage,
}

pub struct Orchestrator {
    db_path: PathBuf,
    gateway: Arc<ExecutionGateway>,
    registry: Arc<AgentRegistry>,
    routing: AgentRoutingTable,
    document_sink: Option<Arc<dyn DocumentSink>>,
}

impl Orchestrator {
    pub fn new(
        db_path: PathBuf,
        gateway: Arc<ExecutionGateway>,
        registry: Arc<AgentRegistry>,
        routing: AgentRoutingTable,
    ) -> Self {
        Self {
            db_path,
            gateway,
            registry,
            routing,
            document_sink: None,
        }
    }

    pub fn with_document_sink(mut self, sink: Arc<dyn DocumentSink>) -> Self {
        self.document_sink = Some(sink);
        self
    }

    /// Handle one conversation turn.
    ///
    /// Storage work runs on short-lived connections on either side of the
    /// model call; no connection is held across an await.
    pub async fn handle_turn(&self, req: ChatTurnRequest) -> Result<ChatTurnResult> {
        let agent_name = req.agent.as_deref().unwrap_or(BASELINE_AGENT);
        let agent = self
            .registry
            .get(agent_name)
            .ok_or_else(|| CoreError::UnknownAgent(agent_name.to_string()))?
            .clone();

        let (conversation_id, phase, lane, system_prompt, messages) = {
            let db = Database::new(&self.db_path)?;

            let conversations = ConversationStore::new(&db);
            let conversation_id = conversations.get_or_create(
                req.conversation_id.as_deref(),
                &req.tenant_id,
                req.project_id.as_deref(),
                req.card_id.as_deref(),
            )?;
            conversations.append_message(
                &conversation_id,
                MessageRole::User,
                &req.message,
                req.metadata.as_ref(),
            )?;

            let phase = self.resolve_phase(&db, &req)?;

            // When the turn targets a card, the agent must be allowed in
            // that card's current lane.
            let lane = match req.card_id.as_deref() {
                Some(card_id) => BoardStore::new(&db).get_card(card_id)?.map(|c| c.lane_number),
                None => None,
            };

            let built = PromptBuilder::new(&db).build(
                &agent,
                &PromptRequest {
                    project_id: req.project_id.clone(),
                    card_id: req.card_id.clone(),
                    raw_title: None,
                    raw_description: None,
                    complexity: req.complexity,
                },
            );
            let system_prompt = format!("{}\n\n{}", built.system_prompt, phase.guidance());

            let mut messages = self.conversation_messages(&db, &conversation_id)?;
            if !built.user_context.is_empty() {
                if let Some(last) = messages.last_mut() {
                    last.content = format!("{}\n\n{}", built.user_context, last.content);
                }
            }

            (conversation_id, phase, lane, system_prompt, messages)
        };

        let options = CallOptions {
            model_hint: Some(agent.model_hint.to_string()),
            ..Default::default()
        };
        let execution = self
            .gateway
            .execute(agent_name, lane, &system_prompt, &messages, &options)
            .await?;

        let (cleaned, actions) = parse_actions(&execution.content);
        let phase_complete = detect_phase_signal(&cleaned, phase);
        let next_phase = if phase_complete { phase.next() } else { None };

        let summary = {
            let db = Database::new(&self.db_path)?;

            let board_id = match req.project_id.as_deref() {
                Some(project_id) => BoardStore::new(&db).board_for_project(project_id)?,
                None => None,
            };
            let summary = ActionExecutor::new(&db, &self.routing).execute(
                &actions,
                agent_name,
                req.project_id.as_deref(),
                board_id.as_deref(),
            );

            if let (Some(next), Some(project_id)) = (next_phase, req.project_id.as_deref()) {
                ProjectStore::new(&db).set_phase(project_id, next)?;
            }

            ConversationStore::new(&db).append_message(
                &conversation_id,
                MessageRole::Assistant,
                &cleaned,
                Some(&serde_json::json!({
                    "model": execution.model,
                    "input_tokens": execution.input_tokens,
                    "output_tokens": execution.output_tokens,
                })),
            )?;

            summary
        };

        if next_phase == Some(PlanningPhase::BlueprintReview) {
            if let Some(project_id) = req.project_id.as_deref() {
                // Entering blueprint review generates the blueprint.
                // Failure is reported, not fatal to the turn.
                if let Err(e) = self.generate_blueprint(project_id).await {
                    tracing::error!("blueprint generation failed: {e}");
                }
            }
        }

        Ok(ChatTurnResult {
            reply: cleaned,
            conversation_id,
            phase,
            phase_complete,
            next_phase,
            actions: summary,
            usage: TurnUsage {
                input_tokens: execution.input_tokens,
                output_tokens: execution.output_tokens,
                cost: execution.cost,
                price: execution.price,
                model: execution.model,
            },
        })
    }

    /// Explicit phase wins; else the project's persisted phase; else
    /// `welcome`.
    fn resolve_phase(&self, db: &Database, req: &ChatTurnRequest) -> Result<PlanningPhase> {
        if let Some(phase) = req.phase {
            return Ok(phase);
        }
        if let Some(project_id) = req.project_id.as_deref() {
            if let Some(project) = ProjectStore::new(db).get(project_id)? {
                return Ok(project.phase.parse().unwrap_or(PlanningPhase::Welcome));
            }
        }
        Ok(PlanningPhase::Welcome)
    }

    fn conversation_messages(
        &self,
        db: &Database,
        conversation_id: &str,
    ) -> Result<Vec<ModelMessage>> {
        let stored = ConversationStore::new(db).messages(conversation_id, Some(HISTORY_LIMIT))?;
        Ok(stored
            .into_iter()
            .map(|m| ModelMessage {
                role: if m.role == "assistant" {
                    Role::Assistant
                } else {
                    Role::User
                },
                content: m.content,
            })
            .collect())
    }

    async fn generate_blueprint(&self, project_id: &str) -> Result<()> {
        let sink = self.document_sink.as_deref();
        let lifecycle = DocumentLifecycle::new(&self.db_path, sink);
        lifecycle
            .generate(
                &self.gateway,
                project_id,
                DocumentType::Blueprint,
                GenerateOptions {
                    create_review_card: true,
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ModelClient, ModelReply, StreamPart, TokenUsage};
    use crate::storage::{UsageRecord, UsageSink};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Returns scripted replies in order, then repeats the last one.
    struct ScriptedClient {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: &[&str]) -> Self {
            let mut replies: Vec<String> = replies.iter().map(|s| s.to_string()).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn complete(
            &self,
            _system_prompt: &str,
            _messages: &[ModelMessage],
            _options: &CallOptions,
        ) -> Result<ModelReply> {
            let mut replies = self.replies.lock().unwrap();
            let content = if replies.len() > 1 {
                replies.pop().unwrap()
            } else {
                replies.last().cloned().unwrap_or_default()
            };
            if content == "ERROR" {
                anyhow::bail!("provider unavailable");
            }
            Ok(ModelReply {
                content,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
                model: "stub-balanced".into(),
                provider: "stub".into(),
            })
        }

        async fn stream(
            &self,
            _system_prompt: &str,
            _messages: &[ModelMessage],
            _options: &CallOptions,
        ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
            unimplemented!("not used in these tests")
        }
    }

    struct NullSink;
    impl UsageSink for NullSink {
        fn record(&self, _record: &UsageRecord) -> Result<()> {
            Ok(())
        }
    }

    fn setup(replies: &[&str]) -> (Orchestrator, TempDir, String) {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("tandem.db");

        let db = Database::new(&db_path).unwrap();
        let project_id = ProjectStore::new(&db).create("Iced Tea Landing").unwrap();
        BoardStore::new(&db).create_board(&project_id, "Main").unwrap();
        drop(db);

        let registry = Arc::new(AgentRegistry::builtin());
        let gateway = Arc::new(ExecutionGateway::new(
            Arc::new(ScriptedClient::new(replies)),
            registry.clone(),
            Arc::new(NullSink),
        ));
        let orchestrator = Orchestrator::new(
            db_path,
            gateway,
            registry,
            AgentRoutingTable::builtin(),
        );
        (orchestrator, temp, project_id)
    }

    fn turn(project_id: &str, message: &str) -> ChatTurnRequest {
        ChatTurnRequest {
            message: message.into(),
            tenant_id: "tenant-1".into(),
            project_id: Some(project_id.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_welcome_turn_advances_to_vision_on_trigger() {
        let reply = "That's a clear problem statement. I'm ready to explore the vision.";
        let (orchestrator, _temp, project_id) = setup(&[reply]);

        let result = orchestrator
            .handle_turn(turn(&project_id, "I want to build a landing page for iced tea"))
            .await
            .unwrap();

        assert_eq!(result.phase, PlanningPhase::Welcome);
        assert!(result.phase_complete);
        assert_eq!(result.next_phase, Some(PlanningPhase::Vision));

        // Advanced phase persisted on the project
        let db = Database::new(&orchestrator.db_path).unwrap();
        let project = ProjectStore::new(&db).get(&project_id).unwrap().unwrap();
        assert_eq!(project.phase, "vision");
    }

    #[tokio::test]
    async fn test_handle_turn_future_is_send() {
        fn assert_send<F: std::future::Future + Send>(f: F) -> F {
            f
        }

        let (orchestrator, _temp, project_id) = setup(&["Noted."]);
        let result = assert_send(orchestrator.handle_turn(turn(&project_id, "hello")))
            .await
            .unwrap();
        assert_eq!(result.reply, "Noted.");
    }

    #[tokio::test]
    async fn test_directives_stripped_and_executed() {
        let reply = "I'll add that to the board.\n\n[CREATE_CARD]\ntitle: Design hero section\nagent: frontend-agent\n[/CREATE_CARD]\n\nWhat's next?";
        let (orchestrator, _temp, project_id) = setup(&[reply]);

        let result = orchestrator
            .handle_turn(turn(&project_id, "We need a hero section"))
            .await
            .unwrap();

        assert!(!result.reply.contains("CREATE_CARD"));
        assert!(result.reply.contains("What's next?"));
        assert_eq!(result.actions.cards_created.len(), 1);
        assert_eq!(result.actions.cards_created[0].lane_number, 6);
        assert!(result.actions.errors.is_empty());
    }

    #[tokio::test]
    async fn test_reply_returned_alongside_action_errors() {
        let reply = "Moving it now.\n\n[MOVE_CARD]\ncard: Nonexistent\nlane: 3\n[/MOVE_CARD]";
        let (orchestrator, _temp, project_id) = setup(&[reply]);

        let result = orchestrator
            .handle_turn(turn(&project_id, "move that card"))
            .await
            .unwrap();

        assert_eq!(result.reply, "Moving it now.");
        assert_eq!(result.actions.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_no_project_makes_actions_precondition_errors() {
        let reply = "[CREATE_CARD]\ntitle: Orphan card\n[/CREATE_CARD]\nNoted.";
        let (orchestrator, _temp, _) = setup(&[reply]);

        let mut req = turn("unused", "add a card");
        req.project_id = None;

        let result = orchestrator.handle_turn(req).await.unwrap();
        assert_eq!(result.actions.errors.len(), 1);
        assert!(result.actions.cards_created.is_empty());
    }

    #[tokio::test]
    async fn test_architecture_completion_generates_blueprint() {
        let architecture_reply =
            "The architecture is settled; the blueprint is ready for review.";
        let blueprint_content = "# Blueprint\nComponents and boundaries.";
        let (orchestrator, _temp, project_id) =
            setup(&[architecture_reply, blueprint_content]);

        let mut req = turn(&project_id, "looks good, wrap up the architecture");
        req.phase = Some(PlanningPhase::Architecture);

        let result = orchestrator.handle_turn(req).await.unwrap();
        assert_eq!(result.next_phase, Some(PlanningPhase::BlueprintReview));

        let db = Database::new(&orchestrator.db_path).unwrap();
        let doc = crate::storage::DocumentStore::new(&db)
            .latest(&project_id, DocumentType::Blueprint)
            .unwrap()
            .unwrap();
        assert_eq!(doc.version, 1);

        let board_id = BoardStore::new(&db).board_for_project(&project_id).unwrap().unwrap();
        assert!(BoardStore::new(&db)
            .find_review_card(&board_id, "blueprint")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces_no_retry() {
        let (orchestrator, _temp, project_id) = setup(&["ERROR"]);

        let err = orchestrator
            .handle_turn(turn(&project_id, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_conversation_reused_and_messages_persisted() {
        let (orchestrator, _temp, project_id) = setup(&["Reply one.", "Reply two."]);

        let first = orchestrator
            .handle_turn(turn(&project_id, "first message"))
            .await
            .unwrap();

        let mut req = turn(&project_id, "second message");
        req.conversation_id = Some(first.conversation_id.clone());
        let second = orchestrator.handle_turn(req).await.unwrap();

        assert_eq!(first.conversation_id, second.conversation_id);

        let db = Database::new(&orchestrator.db_path).unwrap();
        let messages = ConversationStore::new(&db)
            .messages(&first.conversation_id, None)
            .unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[3].content, "Reply two.");
    }

    #[tokio::test]
    async fn test_general_mode_never_advances() {
        let reply = "Sure, let's move to whatever you like.";
        let (orchestrator, _temp, project_id) = setup(&[reply]);

        let mut req = turn(&project_id, "just a question");
        req.phase = Some(PlanningPhase::General);

        let result = orchestrator.handle_turn(req).await.unwrap();
        assert!(!result.phase_complete);
        assert!(result.next_phase.is_none());
    }
}
