//! Directive parsing and board mutation
//!
//! The model embeds tagged directive blocks in its replies; the parser
//! strips them out and the executor applies them to the board.

mod executor;
mod parser;

use serde::Serialize;

pub use executor::ActionExecutor;
pub use parser::parse_actions;

/// A structured directive extracted from model output.
#[derive(Debug, Clone, PartialEq)]
pub enum CardAction {
    Create(CreateAction),
    Move(MoveAction),
    Update(UpdateAction),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateAction {
    pub title: String,
    pub description: Option<String>,
    pub lane: Option<i64>,
    pub priority: Option<String>,
    pub agent: Option<String>,
    pub card_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveAction {
    /// Card id or exact title.
    pub card: String,
    pub lane: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateAction {
    pub card: String,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub agent: Option<String>,
}

/// Reference to a card touched by an executed action.
#[derive(Debug, Clone, Serialize)]
pub struct CardRef {
    pub id: String,
    pub title: String,
    pub lane_number: i64,
}

/// Per-batch execution outcome. Failures are collected per action; one bad
/// directive never blocks the others.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionSummary {
    pub cards_created: Vec<CardRef>,
    pub cards_moved: Vec<CardRef>,
    pub cards_updated: Vec<CardRef>,
    pub errors: Vec<String>,
}

impl ActionSummary {
    pub fn is_empty(&self) -> bool {
        self.cards_created.is_empty()
            && self.cards_moved.is_empty()
            && self.cards_updated.is_empty()
            && self.errors.is_empty()
    }
}
