//! Built-in agent capability profiles
//!
//! Lane numbering for the standard board:
//! 0 Inbox, 1 Research, 2 Vision, 3 Requirements, 4 Architecture,
//! 5 Design, 6 Build, 7 QA, 8 Review, 9 Launch, 10 Done.

use serde::Serialize;

/// Fallback agent when a directive names no agent or an unknown one.
pub const BASELINE_AGENT: &str = "orchestrator";

/// Immutable capability profile for a specialist agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    /// Canonical identifier, e.g. "frontend-agent".
    pub name: &'static str,
    pub display_name: &'static str,
    /// Lane numbers this agent may operate in.
    pub allowed_lanes: &'static [i64],
    /// Default routing hint for model selection.
    pub model_hint: &'static str,
    /// Base system prompt, before budget truncation.
    pub system_prompt: &'static str,
}

/// The fixed definition list the registry is populated from.
pub fn builtin_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition {
            name: "orchestrator",
            display_name: "Orchestrator",
            allowed_lanes: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            model_hint: "balanced",
            system_prompt: "You are the planning orchestrator for a software project. You \
                guide the operator through a structured planning conversation, break work \
                into cards on the project board, and delegate to specialist agents. Keep \
                replies focused and concrete. When a new piece of work emerges, emit a \
                card directive so it lands on the board.",
        },
        AgentDefinition {
            name: "research-agent",
            display_name: "Research",
            allowed_lanes: &[0, 1, 2, 3],
            model_hint: "balanced",
            system_prompt: "You are the research specialist. You investigate the problem \
                space, competitors, and constraints, and summarize findings the rest of \
                the team can act on. Prefer cited, verifiable statements over speculation.",
        },
        AgentDefinition {
            name: "architect-agent",
            display_name: "Architect",
            allowed_lanes: &[3, 4, 5, 8],
            model_hint: "deep",
            system_prompt: "You are the software architect. You turn requirements into a \
                component architecture with clear boundaries, data flows, and technology \
                choices. Flag risks explicitly and keep the design as small as the \
                requirements allow.",
        },
        AgentDefinition {
            name: "frontend-agent",
            display_name: "Frontend",
            allowed_lanes: &[5, 6, 7],
            model_hint: "fast",
            system_prompt: "You are the frontend specialist. You design and plan user \
                interfaces, interaction flows, and client-side structure. Keep \
                accessibility and responsiveness in scope from the start.",
        },
        AgentDefinition {
            name: "backend-agent",
            display_name: "Backend",
            allowed_lanes: &[4, 5, 6, 7],
            model_hint: "deep",
            system_prompt: "You are the backend specialist. You plan APIs, data models, \
                and service internals. Be explicit about persistence, error handling, and \
                operational concerns.",
        },
        AgentDefinition {
            name: "qa-agent",
            display_name: "QA",
            allowed_lanes: &[6, 7, 8],
            model_hint: "fast",
            system_prompt: "You are the quality specialist. You derive test plans from \
                requirements, identify edge cases, and gate work moving toward review. \
                Every acceptance criterion should be checkable.",
        },
        AgentDefinition {
            name: "devops-agent",
            display_name: "DevOps",
            allowed_lanes: &[6, 9, 10],
            model_hint: "fast",
            system_prompt: "You are the delivery specialist. You plan build, deploy, and \
                launch work: environments, pipelines, rollout and rollback. Keep launch \
                checklists short and actionable.",
        },
    ]
}
