//! Prompt assembly under per-section token budgets
//!
//! Sections are concatenated in fixed order: agent system prompt, project
//! style guide, prior agent-document context, project context, card
//! context. A section whose data source fails to load is logged and
//! omitted; the build never fails on a missing section.

use anyhow::Result;
use serde::Serialize;

use super::budget::{
    estimate_tokens, truncate_to_budget, BudgetMode, Complexity, TokenBudget,
};
use crate::agents::AgentDefinition;
use crate::documents::DocumentType;
use crate::storage::{BoardStore, Database, DocumentStore, ProjectStore};

/// When the agent-context allotment is at least this many tokens, prior
/// documents are rendered in full; below it, as one-line summaries.
const AGENT_CONTEXT_FULL_THRESHOLD: usize = 800;

/// Chars of a document shown in summary form.
const SUMMARY_EXCERPT_CHARS: usize = 200;

/// Inputs for one prompt assembly.
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    pub project_id: Option<String>,
    pub card_id: Option<String>,
    /// Raw fallback when no card id is supplied.
    pub raw_title: Option<String>,
    pub raw_description: Option<String>,
    pub complexity: Complexity,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuiltPrompt {
    pub system_prompt: String,
    pub user_context: String,
    /// Sum of the two section estimates. An approximation, not a
    /// billing-accurate count.
    pub total_token_estimate: usize,
    pub mode: BudgetMode,
}

pub struct PromptBuilder<'a> {
    db: &'a Database,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn build(&self, agent: &AgentDefinition, req: &PromptRequest) -> BuiltPrompt {
        let mode = req.complexity.budget_mode();
        let budget = TokenBudget::for_mode(mode);

        let mut system = truncate_to_budget(agent.system_prompt, budget.system_prompt);

        if let Some(project_id) = req.project_id.as_deref() {
            match self.style_guide_section(project_id, &budget) {
                Ok(Some(section)) => {
                    system.push_str("\n\n");
                    system.push_str(&section);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("style guide unavailable, omitting section: {e}"),
            }

            match self.agent_context_section(project_id, &budget) {
                Ok(Some(section)) => {
                    system.push_str("\n\n");
                    system.push_str(&section);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("agent context unavailable, omitting section: {e}"),
            }
        }

        let mut user_context = String::new();

        if let Some(project_id) = req.project_id.as_deref() {
            match self.project_context_section(project_id, &budget) {
                Ok(Some(section)) => user_context.push_str(&section),
                Ok(None) => {}
                Err(e) => tracing::warn!("project context unavailable, omitting section: {e}"),
            }
        }

        match self.card_context_section(req, &budget) {
            Ok(Some(section)) => {
                if !user_context.is_empty() {
                    user_context.push_str("\n\n");
                }
                user_context.push_str(&section);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("card context unavailable, omitting section: {e}"),
        }

        let total_token_estimate = estimate_tokens(&system) + estimate_tokens(&user_context);

        BuiltPrompt {
            system_prompt: system,
            user_context,
            total_token_estimate,
            mode,
        }
    }

    fn style_guide_section(
        &self,
        project_id: &str,
        budget: &TokenBudget,
    ) -> Result<Option<String>> {
        let Some(guide) = ProjectStore::new(self.db).style_guide(project_id)? else {
            return Ok(None);
        };
        Ok(Some(format!(
            "## Project Style Guide\n{}",
            truncate_to_budget(&guide, budget.style_guide)
        )))
    }

    /// Prior agent-authored documents, full or summarized depending on the
    /// allotted budget.
    fn agent_context_section(
        &self,
        project_id: &str,
        budget: &TokenBudget,
    ) -> Result<Option<String>> {
        let docs = DocumentStore::new(self.db).latest_for_project(project_id)?;
        if docs.is_empty() {
            return Ok(None);
        }

        let mut section = String::from("## Prior Planning Documents\n");

        if budget.agent_context >= AGENT_CONTEXT_FULL_THRESHOLD {
            let per_doc = budget.agent_context / docs.len();
            for doc in &docs {
                section.push_str(&format!(
                    "### {} (v{})\n{}\n",
                    doc.doc_type,
                    doc.version,
                    truncate_to_budget(&doc.content, per_doc)
                ));
            }
        } else {
            for doc in &docs {
                let mut chars = doc.content.chars();
                let excerpt: String = chars.by_ref().take(SUMMARY_EXCERPT_CHARS).collect();
                section.push_str(&format!("- {} v{}: {}", doc.doc_type, doc.version, excerpt));
                if chars.next().is_some() {
                    section.push_str(" [content truncated]");
                }
                section.push('\n');
            }
        }

        Ok(Some(section))
    }

    /// Project name, phase, and budgeted excerpts of the blueprint, PRD,
    /// and MVP documents. The per-document budget divides the section's
    /// budget evenly across the documents present.
    fn project_context_section(
        &self,
        project_id: &str,
        budget: &TokenBudget,
    ) -> Result<Option<String>> {
        let Some(project) = ProjectStore::new(self.db).get(project_id)? else {
            anyhow::bail!("project {project_id} not found");
        };

        let mut section = format!(
            "## Project\nName: {}\nPhase: {}\n",
            project.name, project.phase
        );

        let doc_store = DocumentStore::new(self.db);
        let mut excerpts = Vec::new();
        for doc_type in [DocumentType::Blueprint, DocumentType::Prd, DocumentType::Mvp] {
            if let Some(doc) = doc_store.latest(project_id, doc_type)? {
                excerpts.push(doc);
            }
        }

        if !excerpts.is_empty() {
            let per_doc = budget.project_context / excerpts.len();
            for doc in &excerpts {
                section.push_str(&format!(
                    "\n### {}\n{}\n",
                    doc.doc_type,
                    truncate_to_budget(&doc.content, per_doc)
                ));
            }
        }

        Ok(Some(section))
    }

    /// Card context when a card id is supplied, else the raw
    /// title/description pair when present.
    fn card_context_section(
        &self,
        req: &PromptRequest,
        budget: &TokenBudget,
    ) -> Result<Option<String>> {
        if let Some(card_id) = req.card_id.as_deref() {
            let store = BoardStore::new(self.db);
            let Some(card) = store.get_card(card_id)? else {
                anyhow::bail!("card {card_id} not found");
            };

            let mut section = format!(
                "## Current Card\nTitle: {}\nType: {}\nPriority: {}\nStatus: {}\n",
                card.title, card.card_type, card.priority, card.status
            );

            if let Some(parent_id) = card.parent_id.as_deref() {
                if let Some(parent) = store.get_card(parent_id)? {
                    section.push_str(&format!("Parent: {}\n", parent.title));
                }
            }

            let children = store.children_of(&card.id)?;
            if !children.is_empty() {
                section.push_str("Children:\n");
                for child in &children {
                    section.push_str(&format!("- {} [{}]\n", child.title, child.status));
                }
            }

            if !card.description.is_empty() {
                section.push_str(&format!(
                    "Description: {}\n",
                    truncate_to_budget(&card.description, budget.card_context)
                ));
            }

            return Ok(Some(section));
        }

        match (req.raw_title.as_deref(), req.raw_description.as_deref()) {
            (None, None) => Ok(None),
            (title, description) => Ok(Some(format!(
                "## Task\nTitle: {}\nDescription: {}\n",
                title.unwrap_or("(untitled)"),
                truncate_to_budget(description.unwrap_or(""), budget.card_context)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRegistry;
    use crate::storage::{NewCard, ProjectStore};

    fn setup() -> (Database, String) {
        let db = Database::in_memory().unwrap();
        let project_id = ProjectStore::new(&db).create("Iced Tea Landing").unwrap();
        (db, project_id)
    }

    fn agent() -> AgentDefinition {
        AgentRegistry::builtin().get("orchestrator").unwrap().clone()
    }

    #[test]
    fn test_mode_follows_complexity() {
        let (db, project_id) = setup();
        let builder = PromptBuilder::new(&db);

        let req = PromptRequest {
            project_id: Some(project_id),
            complexity: Complexity::Simple,
            ..Default::default()
        };
        assert_eq!(builder.build(&agent(), &req).mode, BudgetMode::Summary);

        let req = PromptRequest {
            complexity: Complexity::Complex,
            ..req
        };
        assert_eq!(builder.build(&agent(), &req).mode, BudgetMode::Full);
    }

    #[test]
    fn test_style_guide_included_and_truncated() {
        let (db, project_id) = setup();
        let guide = "Use sentence case. ".repeat(500);
        ProjectStore::new(&db)
            .set_style_guide(&project_id, &guide)
            .unwrap();

        let built = PromptBuilder::new(&db).build(
            &agent(),
            &PromptRequest {
                project_id: Some(project_id),
                ..Default::default()
            },
        );

        assert!(built.system_prompt.contains("Project Style Guide"));
        assert!(built.system_prompt.contains("[content truncated]"));
    }

    #[test]
    fn test_missing_project_omits_sections() {
        let (db, _) = setup();
        let built = PromptBuilder::new(&db).build(
            &agent(),
            &PromptRequest {
                project_id: Some("does-not-exist".into()),
                raw_title: Some("Quick question".into()),
                ..Default::default()
            },
        );

        // Project context omitted, raw task fallback still present
        assert!(!built.user_context.contains("## Project"));
        assert!(built.user_context.contains("Quick question"));
    }

    #[test]
    fn test_project_context_divides_budget_across_documents() {
        let (db, project_id) = setup();
        let store = DocumentStore::new(&db);
        let long = "architecture notes ".repeat(1000);
        store
            .append_version(&project_id, DocumentType::Blueprint, &long)
            .unwrap();
        store
            .append_version(&project_id, DocumentType::Prd, &long)
            .unwrap();

        let built = PromptBuilder::new(&db).build(
            &agent(),
            &PromptRequest {
                project_id: Some(project_id),
                ..Default::default()
            },
        );

        assert!(built.user_context.contains("### blueprint"));
        assert!(built.user_context.contains("### prd"));
        // Both excerpts over their half-share of the budget get cut
        assert_eq!(built.user_context.matches("[content truncated]").count() >= 2, true);
    }

    #[test]
    fn test_summary_doc_excerpt_marks_truncation() {
        let (db, project_id) = setup();
        let store = DocumentStore::new(&db);
        let long = "vision statement ".repeat(50);
        store
            .append_version(&project_id, DocumentType::Blueprint, &long)
            .unwrap();
        store
            .append_version(&project_id, DocumentType::Prd, "short prd")
            .unwrap();

        let built = PromptBuilder::new(&db).build(
            &agent(),
            &PromptRequest {
                project_id: Some(project_id),
                complexity: Complexity::Simple,
                ..Default::default()
            },
        );

        assert_eq!(built.mode, BudgetMode::Summary);
        assert!(built.system_prompt.contains("- blueprint v1:"));
        let blueprint_line = built
            .system_prompt
            .lines()
            .find(|l| l.starts_with("- blueprint"))
            .unwrap();
        assert!(blueprint_line.ends_with("[content truncated]"));
        assert!(built.system_prompt.contains("- prd v1: short prd\n"));
    }

    #[test]
    fn test_card_context_with_children() {
        let (db, project_id) = setup();
        let board_id = BoardStore::new(&db)
            .create_board(&project_id, "Main")
            .unwrap();
        let store = BoardStore::new(&db);
        let lane = store.find_lane(&board_id, 6).unwrap().unwrap();

        let parent = NewCard {
            title: "Build landing page".into(),
            ..Default::default()
        };
        let parent_id = store.insert_card(&board_id, &lane.id, &parent).unwrap();

        let child = NewCard {
            title: "Hero section".into(),
            parent_id: Some(parent_id.clone()),
            ..Default::default()
        };
        store.insert_card(&board_id, &lane.id, &child).unwrap();

        let built = PromptBuilder::new(&db).build(
            &agent(),
            &PromptRequest {
                project_id: Some(project_id),
                card_id: Some(parent_id),
                ..Default::default()
            },
        );

        assert!(built.user_context.contains("## Current Card"));
        assert!(built.user_context.contains("Hero section"));
    }
}
