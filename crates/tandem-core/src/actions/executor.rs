//! Action executor
//!
//! Applies parsed directives to the board. Actions are processed
//! independently; per-action failures land in `ActionSummary::errors` and
//! never abort the batch. Each action runs inside its own transaction so
//! the dedup lookup and the final write stay as close together as SQLite
//! allows.

use anyhow::Result;

use super::{ActionSummary, CardAction, CardRef, CreateAction, MoveAction, UpdateAction};
use crate::agents::AgentRoutingTable;
use crate::error::CoreError;
use crate::storage::{BoardStore, Database, NewCard};

pub struct ActionExecutor<'a> {
    db: &'a Database,
    routing: &'a AgentRoutingTable,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(db: &'a Database, routing: &'a AgentRoutingTable) -> Self {
        Self { db, routing }
    }

    /// Execute a batch of actions against the board.
    ///
    /// A missing project or board id is a precondition failure: no action
    /// executes and every action is reported in the error list.
    pub fn execute(
        &self,
        actions: &[CardAction],
        acting_agent: &str,
        project_id: Option<&str>,
        board_id: Option<&str>,
    ) -> ActionSummary {
        let mut summary = ActionSummary::default();

        if actions.is_empty() {
            return summary;
        }

        let missing = if project_id.is_none() {
            Some(CoreError::MissingContext("project id"))
        } else if board_id.is_none() {
            Some(CoreError::MissingContext("board id"))
        } else {
            None
        };

        if let Some(err) = missing {
            for action in actions {
                summary
                    .errors
                    .push(format!("{}: {err}", describe_action(action)));
            }
            return summary;
        }

        let board_id = board_id.unwrap_or_default();

        for action in actions {
            let result = match action {
                CardAction::Create(create) => {
                    self.apply_create(create, acting_agent, board_id, &mut summary)
                }
                CardAction::Move(mv) => self.apply_move(mv, acting_agent, board_id, &mut summary),
                CardAction::Update(update) => {
                    self.apply_update(update, acting_agent, board_id, &mut summary)
                }
            };

            if let Err(e) = result {
                tracing::warn!(action = %describe_action(action), "action failed: {e}");
                summary
                    .errors
                    .push(format!("{}: {e}", describe_action(action)));
            }
        }

        summary
    }

    /// Create a card, or fold the action into an update when a card with
    /// the exact same title already exists on the board.
    fn apply_create(
        &self,
        action: &CreateAction,
        acting_agent: &str,
        board_id: &str,
        summary: &mut ActionSummary,
    ) -> Result<()> {
        let tx = self.db.conn().unchecked_transaction()?;
        let store = BoardStore::new(self.db);

        // Directive agent names may be free-text mentions ("frontend");
        // resolve to canonical names before routing.
        let agent = action
            .agent
            .as_deref()
            .map(|a| {
                self.routing
                    .resolve_mention(a)
                    .map(str::to_string)
                    .unwrap_or_else(|| a.to_string())
            })
            .unwrap_or_else(|| acting_agent.to_string());

        let route = self.routing.route_or_baseline(Some(agent.as_str()));
        let lane_number = action.lane.unwrap_or(route.default_lane);
        let lane = store
            .find_lane(board_id, lane_number)?
            .ok_or(CoreError::LaneNotFound(lane_number))?;
        let priority = action
            .priority
            .clone()
            .unwrap_or_else(|| route.default_priority.to_string());

        if let Some(existing) = store.find_card_by_title(board_id, &action.title)? {
            // Deduplication invariant: second create with the same title
            // becomes an update, never a duplicate row.
            let old_lane = existing.lane_number;
            if existing.lane_id != lane.id {
                store.move_card(&existing.id, &lane.id)?;
            }

            if let Some(new_desc) = action.description.as_deref() {
                if !existing.description.contains(new_desc) {
                    let merged = if existing.description.is_empty() {
                        new_desc.to_string()
                    } else {
                        format!("{}\n\n{}", existing.description, new_desc)
                    };
                    store.set_card_field(&existing.id, "description", &merged)?;
                }
            }

            store.set_card_field(&existing.id, "priority", &priority)?;
            store.set_card_field(&existing.id, "agent", &agent)?;
            store.set_card_field(&existing.id, "status", "pending")?;

            store.record_history(
                &existing.id,
                "lane",
                Some(&old_lane.to_string()),
                Some(&lane_number.to_string()),
                acting_agent,
                "duplicate title: create folded into update of existing card",
            )?;

            tx.commit()?;
            summary.cards_updated.push(CardRef {
                id: existing.id,
                title: existing.title,
                lane_number,
            });
            return Ok(());
        }

        let card = NewCard {
            title: action.title.clone(),
            description: action.description.clone().unwrap_or_default(),
            card_type: action.card_type.clone().unwrap_or_else(|| "task".into()),
            priority,
            agent: Some(agent),
            status: "pending".into(),
            ..Default::default()
        };
        let id = store.insert_card(board_id, &lane.id, &card)?;

        tx.commit()?;
        summary.cards_created.push(CardRef {
            id,
            title: action.title.clone(),
            lane_number,
        });
        Ok(())
    }

    fn apply_move(
        &self,
        action: &MoveAction,
        acting_agent: &str,
        board_id: &str,
        summary: &mut ActionSummary,
    ) -> Result<()> {
        let tx = self.db.conn().unchecked_transaction()?;
        let store = BoardStore::new(self.db);

        let card = store
            .resolve_card(board_id, &action.card)?
            .ok_or_else(|| CoreError::CardNotFound(action.card.clone()))?;
        let lane = store
            .find_lane(board_id, action.lane)?
            .ok_or(CoreError::LaneNotFound(action.lane))?;

        store.move_card(&card.id, &lane.id)?;
        store.record_history(
            &card.id,
            "lane",
            Some(&card.lane_number.to_string()),
            Some(&action.lane.to_string()),
            acting_agent,
            "moved by directive",
        )?;

        tx.commit()?;
        summary.cards_moved.push(CardRef {
            id: card.id,
            title: card.title,
            lane_number: action.lane,
        });
        Ok(())
    }

    /// Apply only the fields explicitly present; absent fields are
    /// untouched.
    fn apply_update(
        &self,
        action: &UpdateAction,
        acting_agent: &str,
        board_id: &str,
        summary: &mut ActionSummary,
    ) -> Result<()> {
        let tx = self.db.conn().unchecked_transaction()?;
        let store = BoardStore::new(self.db);

        let card = store
            .resolve_card(board_id, &action.card)?
            .ok_or_else(|| CoreError::CardNotFound(action.card.clone()))?;

        let changes: [(&str, Option<&str>, &str); 3] = [
            ("status", action.status.as_deref(), card.status.as_str()),
            ("priority", action.priority.as_deref(), card.priority.as_str()),
            ("agent", action.agent.as_deref(), card.agent.as_deref().unwrap_or("")),
        ];

        for (field, new_value, old_value) in changes {
            let Some(new_value) = new_value else {
                continue;
            };
            if new_value == old_value {
                continue;
            }
            store.set_card_field(&card.id, field, new_value)?;
            store.record_history(
                &card.id,
                field,
                Some(old_value),
                Some(new_value),
                acting_agent,
                "updated by directive",
            )?;
        }

        tx.commit()?;
        summary.cards_updated.push(CardRef {
            id: card.id,
            title: card.title,
            lane_number: card.lane_number,
        });
        Ok(())
    }
}

fn describe_action(action: &CardAction) -> String {
    match action {
        CardAction::Create(c) => format!("create '{}'", c.title),
        CardAction::Move(m) => format!("move '{}' to lane {}", m.card, m.lane),
        CardAction::Update(u) => format!("update '{}'", u.card),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ProjectStore;

    fn setup() -> (Database, AgentRoutingTable, String, String) {
        let db = Database::in_memory().unwrap();
        let project_id = ProjectStore::new(&db).create("P").unwrap();
        let board_id = BoardStore::new(&db).create_board(&project_id, "Main").unwrap();
        (db, AgentRoutingTable::builtin(), project_id, board_id)
    }

    fn create(title: &str, agent: Option<&str>) -> CardAction {
        CardAction::Create(CreateAction {
            title: title.into(),
            agent: agent.map(Into::into),
            ..Default::default()
        })
    }

    #[test]
    fn test_missing_board_is_precondition_failure() {
        let (db, routing, project_id, _) = setup();
        let executor = ActionExecutor::new(&db, &routing);

        let actions = vec![create("A", None), create("B", None)];
        let summary = executor.execute(&actions, "orchestrator", Some(&project_id), None);

        assert_eq!(summary.errors.len(), 2);
        assert!(summary.cards_created.is_empty());
        assert!(BoardStore::new(&db)
            .find_card_by_title("any", "A")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_create_uses_agent_default_lane_and_priority() {
        let (db, routing, project_id, board_id) = setup();
        let executor = ActionExecutor::new(&db, &routing);

        let actions = vec![create("Design login screen", Some("frontend-agent"))];
        let summary = executor.execute(&actions, "orchestrator", Some(&project_id), Some(&board_id));

        assert!(summary.errors.is_empty());
        assert_eq!(summary.cards_created.len(), 1);
        assert_eq!(summary.cards_created[0].lane_number, 6);

        let card = BoardStore::new(&db)
            .find_card_by_title(&board_id, "Design login screen")
            .unwrap()
            .unwrap();
        assert_eq!(card.priority, "medium");
        assert_eq!(card.agent.as_deref(), Some("frontend-agent"));
    }

    #[test]
    fn test_unknown_agent_falls_back_to_baseline() {
        let (db, routing, project_id, board_id) = setup();
        let executor = ActionExecutor::new(&db, &routing);

        let actions = vec![create("Mystery work", Some("blockchain-agent"))];
        let summary = executor.execute(&actions, "orchestrator", Some(&project_id), Some(&board_id));

        // Baseline agent's default lane is 0
        assert_eq!(summary.cards_created[0].lane_number, 0);
    }

    #[test]
    fn test_duplicate_title_becomes_update_with_one_history_entry() {
        let (db, routing, project_id, board_id) = setup();
        let executor = ActionExecutor::new(&db, &routing);
        let store = BoardStore::new(&db);

        let first = executor.execute(
            &[create("Design login screen", Some("frontend-agent"))],
            "orchestrator",
            Some(&project_id),
            Some(&board_id),
        );
        let card_id = first.cards_created[0].id.clone();
        store.set_card_field(&card_id, "status", "active").unwrap();

        let second = executor.execute(
            &[create("Design login screen", Some("backend-agent"))],
            "orchestrator",
            Some(&project_id),
            Some(&board_id),
        );

        assert!(second.cards_created.is_empty());
        assert_eq!(second.cards_updated.len(), 1);
        assert_eq!(second.cards_updated[0].id, card_id);

        // Board card count unchanged, status reset, exactly one history entry
        assert_eq!(store.cards_for_board(&board_id).unwrap().len(), 1);
        let card = store.get_card(&card_id).unwrap().unwrap();
        assert_eq!(card.status, "pending");
        assert_eq!(card.agent.as_deref(), Some("backend-agent"));
        assert_eq!(store.history_for_card(&card_id).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_lane_is_per_action_error_batch_proceeds() {
        let (db, routing, project_id, board_id) = setup();
        let executor = ActionExecutor::new(&db, &routing);

        let seeded = executor.execute(
            &[create("Mover", None)],
            "orchestrator",
            Some(&project_id),
            Some(&board_id),
        );
        assert_eq!(seeded.cards_created.len(), 1);

        let actions = vec![
            CardAction::Move(MoveAction {
                card: "Mover".into(),
                lane: 99,
            }),
            create("Survivor", None),
        ];
        let summary = executor.execute(&actions, "orchestrator", Some(&project_id), Some(&board_id));

        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("99"));
        assert_eq!(summary.cards_created.len(), 1);
        assert_eq!(summary.cards_created[0].title, "Survivor");
    }

    #[test]
    fn test_update_touches_only_present_fields() {
        let (db, routing, project_id, board_id) = setup();
        let executor = ActionExecutor::new(&db, &routing);
        let store = BoardStore::new(&db);

        let seeded = executor.execute(
            &[create("Tweak me", Some("qa-agent"))],
            "orchestrator",
            Some(&project_id),
            Some(&board_id),
        );
        let card_id = seeded.cards_created[0].id.clone();

        let actions = vec![CardAction::Update(UpdateAction {
            card: "Tweak me".into(),
            status: Some("active".into()),
            ..Default::default()
        })];
        executor.execute(&actions, "qa-agent", Some(&project_id), Some(&board_id));

        let card = store.get_card(&card_id).unwrap().unwrap();
        assert_eq!(card.status, "active");
        // Untouched fields keep their values
        assert_eq!(card.agent.as_deref(), Some("qa-agent"));
        assert_eq!(card.priority, "medium");
    }

    #[test]
    fn test_positions_unique_and_nondecreasing_when_serial() {
        let (db, routing, project_id, board_id) = setup();
        let executor = ActionExecutor::new(&db, &routing);

        let actions: Vec<_> = (0..5)
            .map(|i| create(&format!("Card {i}"), Some("qa-agent")))
            .collect();
        executor.execute(&actions, "orchestrator", Some(&project_id), Some(&board_id));

        let store = BoardStore::new(&db);
        let lane = store.find_lane(&board_id, 7).unwrap().unwrap();
        let positions: Vec<_> = store
            .cards_for_lane(&lane.id)
            .unwrap()
            .iter()
            .map(|c| c.position)
            .collect();

        let mut sorted = positions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), positions.len(), "positions must be unique");
        assert_eq!(positions, sorted, "positions must be non-decreasing");
    }
}
