//! Planning-phase state machine
//!
//! Drives the conversation through a fixed, ordered sequence of phases.
//! The state machine itself performs no side effects: it reports completion
//! to the caller, which persists the advanced phase and triggers document
//! generation on entry into blueprint review.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A step in the fixed planning-conversation sequence.
///
/// `General` is a non-sequential mode that never advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanningPhase {
    Welcome,
    Vision,
    Requirements,
    Goals,
    Roles,
    Architecture,
    BlueprintReview,
    PlanningComplete,
    General,
}

/// Ordered sequence of sequential phases (excludes `General`).
const PHASE_ORDER: [PlanningPhase; 8] = [
    PlanningPhase::Welcome,
    PlanningPhase::Vision,
    PlanningPhase::Requirements,
    PlanningPhase::Goals,
    PlanningPhase::Roles,
    PlanningPhase::Architecture,
    PlanningPhase::BlueprintReview,
    PlanningPhase::PlanningComplete,
];

/// Generic cross-cutting trigger phrases, matched regardless of phase.
/// A generic match advances a single step only, never skips ahead.
const GENERIC_TRIGGERS: [&str; 4] = [
    "let's move to",
    "ready to proceed",
    "moving on to",
    "let's proceed to",
];

impl PlanningPhase {
    /// Next phase in the fixed ordering.
    ///
    /// `None` at the terminal phase and for `General`.
    pub fn next(self) -> Option<PlanningPhase> {
        if self == PlanningPhase::General {
            return None;
        }
        let idx = PHASE_ORDER.iter().position(|p| *p == self)?;
        PHASE_ORDER.get(idx + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self == PlanningPhase::PlanningComplete
    }

    /// Guidance text injected into the system prompt for this phase.
    ///
    /// Each sequential phase states its objective and instructs the model
    /// not to re-ask questions the operator already answered.
    pub fn guidance(self) -> &'static str {
        match self {
            PlanningPhase::Welcome => {
                "Current phase: WELCOME. Greet the operator, learn what they want to \
                 build and the problem it solves. Do not re-ask for information the \
                 operator has already provided. When the problem statement is clear, \
                 say you are ready to explore the vision."
            }
            PlanningPhase::Vision => {
                "Current phase: VISION. Clarify the product vision, target users, and \
                 what success looks like. Do not repeat questions already answered. \
                 When the vision is settled, say you are ready to gather requirements."
            }
            PlanningPhase::Requirements => {
                "Current phase: REQUIREMENTS. Enumerate concrete functional and \
                 non-functional requirements. Do not re-ask settled questions. When \
                 the requirement list is stable, say you are ready to define goals."
            }
            PlanningPhase::Goals => {
                "Current phase: GOALS. Turn requirements into measurable goals and \
                 milestones. Do not revisit answered questions. When goals are \
                 agreed, say you are ready to assign roles."
            }
            PlanningPhase::Roles => {
                "Current phase: ROLES. Decide which specialist agents own which \
                 areas of work. Do not re-ask prior questions. When ownership is \
                 clear, say you are ready to design the architecture."
            }
            PlanningPhase::Architecture => {
                "Current phase: ARCHITECTURE. Sketch the technical architecture, \
                 major components, and their boundaries. Do not repeat earlier \
                 questions. When the architecture is settled, say the blueprint is \
                 ready for review."
            }
            PlanningPhase::BlueprintReview => {
                "Current phase: BLUEPRINT REVIEW. Walk the operator through the \
                 generated blueprint and collect corrections. When the operator \
                 approves it, say planning is complete."
            }
            PlanningPhase::PlanningComplete => {
                "Current phase: PLANNING COMPLETE. Planning is finished; answer \
                 follow-up questions and help refine the board."
            }
            PlanningPhase::General => {
                "General assistance mode. Answer the operator directly; there is no \
                 phase to advance."
            }
        }
    }

    /// Phrases in the model's reply that signal this phase is complete.
    fn triggers(self) -> &'static [&'static str] {
        match self {
            PlanningPhase::Welcome => &["ready to explore the vision", "explore your vision"],
            PlanningPhase::Vision => &["ready to gather requirements", "gather the requirements"],
            PlanningPhase::Requirements => &["ready to define goals", "define the goals"],
            PlanningPhase::Goals => &["ready to assign roles", "assign the roles"],
            PlanningPhase::Roles => &["ready to design the architecture", "design the architecture"],
            PlanningPhase::Architecture => &["blueprint is ready for review", "ready for review"],
            PlanningPhase::BlueprintReview => &["planning is complete", "planning complete"],
            PlanningPhase::PlanningComplete | PlanningPhase::General => &[],
        }
    }
}

impl fmt::Display for PlanningPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanningPhase::Welcome => "welcome",
            PlanningPhase::Vision => "vision",
            PlanningPhase::Requirements => "requirements",
            PlanningPhase::Goals => "goals",
            PlanningPhase::Roles => "roles",
            PlanningPhase::Architecture => "architecture",
            PlanningPhase::BlueprintReview => "blueprint-review",
            PlanningPhase::PlanningComplete => "planning-complete",
            PlanningPhase::General => "general",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanningPhase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(PlanningPhase::Welcome),
            "vision" => Ok(PlanningPhase::Vision),
            "requirements" => Ok(PlanningPhase::Requirements),
            "goals" => Ok(PlanningPhase::Goals),
            "roles" => Ok(PlanningPhase::Roles),
            "architecture" => Ok(PlanningPhase::Architecture),
            "blueprint-review" => Ok(PlanningPhase::BlueprintReview),
            "planning-complete" => Ok(PlanningPhase::PlanningComplete),
            "general" => Ok(PlanningPhase::General),
            other => Err(CoreError::UnknownPhase(other.to_string())),
        }
    }
}

/// Check the cleaned reply for a phase-completion signal.
///
/// The reply must already have directive blocks stripped. Matching is
/// case-insensitive against the current phase's trigger phrases plus the
/// generic cross-cutting set. `General` and the terminal phase never signal.
pub fn detect_phase_signal(text: &str, phase: PlanningPhase) -> bool {
    if phase == PlanningPhase::General || phase.is_terminal() {
        return false;
    }

    let lower = text.to_lowercase();

    if phase.triggers().iter().any(|t| lower.contains(t)) {
        return true;
    }

    GENERIC_TRIGGERS.iter().any(|t| lower.contains(t))
}
