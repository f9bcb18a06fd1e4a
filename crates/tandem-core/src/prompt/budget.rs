//! Token budgeting and truncation
//!
//! Token counts are estimated as ceil(len / 4); this is an approximation
//! for context-window safety, never a billing-accurate count.

use serde::{Deserialize, Serialize};

/// Marker appended to any content that was cut to fit its budget.
/// Truncation is never silent.
pub const TRUNCATION_MARKER: &str = "\n[content truncated]";

/// Estimated chars per token.
const CHARS_PER_TOKEN: usize = 4;

/// Requested reasoning depth for a turn; selects the budget mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetMode {
    Full,
    Summary,
}

impl Complexity {
    /// Deterministic mode selection: simple turns get the summary tables,
    /// everything else the full ones.
    pub fn budget_mode(self) -> BudgetMode {
        match self {
            Complexity::Simple => BudgetMode::Summary,
            Complexity::Moderate | Complexity::Complex => BudgetMode::Full,
        }
    }
}

/// Per-section maximum token allowances for one assembly mode.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub system_prompt: usize,
    pub style_guide: usize,
    pub agent_context: usize,
    pub project_context: usize,
    pub card_context: usize,
}

impl TokenBudget {
    pub fn for_mode(mode: BudgetMode) -> Self {
        match mode {
            BudgetMode::Full => Self {
                system_prompt: 2000,
                style_guide: 800,
                agent_context: 1500,
                project_context: 2000,
                card_context: 800,
            },
            BudgetMode::Summary => Self {
                system_prompt: 1200,
                style_guide: 400,
                agent_context: 500,
                project_context: 800,
                card_context: 400,
            },
        }
    }
}

/// Estimate the token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Hard-cut `text` at the character offset corresponding to
/// `budget_tokens`, suffixed with the truncation marker. Content within
/// budget is returned unchanged.
pub fn truncate_to_budget(text: &str, budget_tokens: usize) -> String {
    if estimate_tokens(text) <= budget_tokens {
        return text.to_string();
    }

    let cut = floor_char_boundary(text, budget_tokens * CHARS_PER_TOKEN);
    format!("{}{}", &text[..cut], TRUNCATION_MARKER)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_within_budget_untouched() {
        let text = "short enough";
        assert_eq!(truncate_to_budget(text, 100), text);
    }

    #[test]
    fn test_truncation_bound_holds() {
        let marker_overhead = estimate_tokens(TRUNCATION_MARKER);
        let text = "x".repeat(10_000);

        for budget in [1, 10, 100, 1000] {
            let cut = truncate_to_budget(&text, budget);
            assert!(
                estimate_tokens(&cut) <= budget + marker_overhead,
                "budget {budget} exceeded: {}",
                estimate_tokens(&cut)
            );
            assert!(cut.ends_with(TRUNCATION_MARKER.trim_start_matches('\n')));
        }
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let text = "héllo wörld ".repeat(500);
        let cut = truncate_to_budget(&text, 10);
        // Slicing mid-codepoint would have panicked; verify it's valid UTF-8 text
        assert!(cut.contains('h'));
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(Complexity::Simple.budget_mode(), BudgetMode::Summary);
        assert_eq!(Complexity::Moderate.budget_mode(), BudgetMode::Full);
        assert_eq!(Complexity::Complex.budget_mode(), BudgetMode::Full);
    }
}
