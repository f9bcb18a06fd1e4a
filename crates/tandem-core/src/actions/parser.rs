//! Directive block parser
//!
//! Blocks are tagged `[CREATE_CARD]`, `[MOVE_CARD]`, `[UPDATE_CARD]` with a
//! `key: value` body line per field. Malformed or incomplete blocks are
//! dropped silently but still stripped from the visible reply; a clean
//! user-facing reply wins over strict validation. This leniency is
//! intentional, not an oversight.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{CardAction, CreateAction, MoveAction, UpdateAction};

static CREATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[CREATE_CARD\](.*?)\[/CREATE_CARD\]").unwrap());
static MOVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[MOVE_CARD\](.*?)\[/MOVE_CARD\]").unwrap());
static UPDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[UPDATE_CARD\](.*?)\[/UPDATE_CARD\]").unwrap());

/// Collapse the blank runs left behind where blocks were stripped.
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Extract directive blocks from raw model output.
///
/// Returns the reply with every recognized block removed (valid or not)
/// and the actions that validated. Parsing the cleaned text again yields
/// zero actions and an unchanged string.
pub fn parse_actions(text: &str) -> (String, Vec<CardAction>) {
    let mut actions = Vec::new();

    for capture in CREATE_RE.captures_iter(text) {
        let fields = parse_fields(&capture[1]);
        if let Some(action) = build_create(&fields) {
            actions.push(CardAction::Create(action));
        }
    }

    for capture in MOVE_RE.captures_iter(text) {
        let fields = parse_fields(&capture[1]);
        if let Some(action) = build_move(&fields) {
            actions.push(CardAction::Move(action));
        }
    }

    for capture in UPDATE_RE.captures_iter(text) {
        let fields = parse_fields(&capture[1]);
        if let Some(action) = build_update(&fields) {
            actions.push(CardAction::Update(action));
        }
    }

    let mut cleaned = CREATE_RE.replace_all(text, "").into_owned();
    cleaned = MOVE_RE.replace_all(&cleaned, "").into_owned();
    cleaned = UPDATE_RE.replace_all(&cleaned, "").into_owned();
    let cleaned = BLANK_RUN_RE.replace_all(&cleaned, "\n\n").trim().to_string();

    (cleaned, actions)
}

/// Split a block body into key/value pairs, splitting each line on the
/// first colon. Lines without a colon are ignored.
fn parse_fields(body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in body.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();
        if !key.is_empty() {
            fields.insert(key, value);
        }
    }
    fields
}

fn non_empty(fields: &HashMap<String, String>, key: &str) -> Option<String> {
    fields.get(key).filter(|v| !v.is_empty()).cloned()
}

/// A create block is accepted only with a non-empty title.
fn build_create(fields: &HashMap<String, String>) -> Option<CreateAction> {
    let title = non_empty(fields, "title")?;
    Some(CreateAction {
        title,
        description: non_empty(fields, "description"),
        lane: non_empty(fields, "lane").and_then(|l| l.parse().ok()),
        priority: non_empty(fields, "priority"),
        agent: non_empty(fields, "agent"),
        card_type: non_empty(fields, "type"),
    })
}

/// A move block needs both a card identifier and a destination lane.
fn build_move(fields: &HashMap<String, String>) -> Option<MoveAction> {
    let card = non_empty(fields, "card")?;
    let lane = non_empty(fields, "lane")?.parse().ok()?;
    Some(MoveAction { card, lane })
}

/// An update block needs a card identifier; all other fields are optional.
fn build_update(fields: &HashMap<String, String>) -> Option<UpdateAction> {
    let card = non_empty(fields, "card")?;
    Some(UpdateAction {
        card,
        status: non_empty(fields, "status"),
        priority: non_empty(fields, "priority"),
        agent: non_empty(fields, "agent"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_block_parsed_and_stripped() {
        let text = "I'll track that.\n\n[CREATE_CARD]\ntitle: Design login screen\nagent: frontend-agent\npriority: high\n[/CREATE_CARD]\n\nAnything else?";
        let (cleaned, actions) = parse_actions(text);

        assert_eq!(actions.len(), 1);
        let CardAction::Create(create) = &actions[0] else {
            panic!("expected create action");
        };
        assert_eq!(create.title, "Design login screen");
        assert_eq!(create.agent.as_deref(), Some("frontend-agent"));
        assert!(create.lane.is_none());

        assert!(!cleaned.contains("CREATE_CARD"));
        assert!(cleaned.contains("I'll track that."));
        assert!(cleaned.contains("Anything else?"));
    }

    #[test]
    fn test_multiple_blocks_of_same_kind() {
        let text = "[CREATE_CARD]\ntitle: A\n[/CREATE_CARD]\n[CREATE_CARD]\ntitle: B\n[/CREATE_CARD]";
        let (_, actions) = parse_actions(text);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_malformed_block_dropped_but_stripped() {
        // No title: invalid create, still removed from the reply
        let text = "Done.\n[CREATE_CARD]\ndescription: orphan\n[/CREATE_CARD]";
        let (cleaned, actions) = parse_actions(text);
        assert!(actions.is_empty());
        assert_eq!(cleaned, "Done.");
    }

    #[test]
    fn test_move_requires_card_and_lane() {
        let missing_lane = "[MOVE_CARD]\ncard: abc\n[/MOVE_CARD]";
        assert!(parse_actions(missing_lane).1.is_empty());

        let bad_lane = "[MOVE_CARD]\ncard: abc\nlane: seven\n[/MOVE_CARD]";
        assert!(parse_actions(bad_lane).1.is_empty());

        let ok = "[MOVE_CARD]\ncard: abc\nlane: 7\n[/MOVE_CARD]";
        let (_, actions) = parse_actions(ok);
        assert_eq!(
            actions,
            vec![CardAction::Move(MoveAction {
                card: "abc".into(),
                lane: 7
            })]
        );
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let text = "[UPDATE_CARD]\ncard: abc\nstatus: active\n[/UPDATE_CARD]";
        let (_, actions) = parse_actions(text);
        let CardAction::Update(update) = &actions[0] else {
            panic!("expected update action");
        };
        assert_eq!(update.status.as_deref(), Some("active"));
        assert!(update.priority.is_none());
        assert!(update.agent.is_none());
    }

    #[test]
    fn test_value_may_contain_colons() {
        let text = "[CREATE_CARD]\ntitle: Fix: the build\n[/CREATE_CARD]";
        let (_, actions) = parse_actions(text);
        let CardAction::Create(create) = &actions[0] else {
            panic!("expected create action");
        };
        assert_eq!(create.title, "Fix: the build");
    }

    #[test]
    fn test_parse_is_idempotent_on_cleaned_output() {
        let text = "Before\n[CREATE_CARD]\ntitle: A\n[/CREATE_CARD]\nAfter\n[MOVE_CARD]\ncard: A\nlane: 3\n[/MOVE_CARD]";
        let (cleaned, actions) = parse_actions(text);
        assert_eq!(actions.len(), 2);

        let (cleaned_again, actions_again) = parse_actions(&cleaned);
        assert!(actions_again.is_empty());
        assert_eq!(cleaned_again, cleaned);
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "No directives here, just a reply.";
        let (cleaned, actions) = parse_actions(text);
        assert!(actions.is_empty());
        assert_eq!(cleaned, text);
    }
}
