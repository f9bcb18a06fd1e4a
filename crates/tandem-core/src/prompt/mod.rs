//! Prompt assembly under per-section token budgets

mod budget;
mod builder;

pub use budget::{
    estimate_tokens, truncate_to_budget, BudgetMode, Complexity, TokenBudget, TRUNCATION_MARKER,
};
pub use builder::{BuiltPrompt, PromptBuilder, PromptRequest};
