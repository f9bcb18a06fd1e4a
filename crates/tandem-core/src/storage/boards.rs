//! Board, lane, card, and card-history operations
//!
//! Cards belong to exactly one lane at a time; ownership transfers on move.
//! Position within a lane is assigned as max(position) + 1 on insert. Cards
//! are never hard-deleted by this core.

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::Database;

/// Lane names for the standard board, indexed by lane number.
pub const STANDARD_LANES: [&str; 11] = [
    "Inbox",
    "Research",
    "Vision",
    "Requirements",
    "Architecture",
    "Design",
    "Build",
    "QA",
    "Review",
    "Launch",
    "Done",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    pub id: String,
    pub board_id: String,
    pub lane_number: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub board_id: String,
    pub lane_id: String,
    pub lane_number: i64,
    pub parent_id: Option<String>,
    pub title: String,
    pub description: String,
    pub card_type: String,
    pub doc_type: Option<String>,
    pub priority: String,
    pub agent: Option<String>,
    pub status: String,
    pub position: i64,
}

/// Fields for inserting a new card.
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub title: String,
    pub description: String,
    pub card_type: String,
    pub doc_type: Option<String>,
    pub priority: String,
    pub agent: Option<String>,
    pub status: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub card_id: String,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: String,
    pub reason: String,
    pub created_at: String,
}

const CARD_COLUMNS: &str = "c.id, c.board_id, c.lane_id, l.lane_number, c.parent_id, c.title, \
     c.description, c.card_type, c.doc_type, c.priority, c.agent, c.status, c.position";

pub struct BoardStore<'a> {
    db: &'a Database,
}

impl<'a> BoardStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    // =========================================================================
    // Boards and lanes
    // =========================================================================

    /// Create a board with the standard lane layout (0..=10).
    pub fn create_board(&self, project_id: &str, name: &str) -> Result<String> {
        let board_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        self.db.conn().execute(
            "INSERT INTO boards (id, project_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![board_id, project_id, name, now],
        )?;

        for (number, lane_name) in STANDARD_LANES.iter().enumerate() {
            self.create_lane(&board_id, number as i64, lane_name)?;
        }

        Ok(board_id)
    }

    pub fn create_lane(&self, board_id: &str, lane_number: i64, name: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.db.conn().execute(
            "INSERT INTO lanes (id, board_id, lane_number, name) VALUES (?1, ?2, ?3, ?4)",
            params![id, board_id, lane_number, name],
        )?;
        Ok(id)
    }

    /// First board owned by the project, if any.
    pub fn board_for_project(&self, project_id: &str) -> Result<Option<String>> {
        let result = self.db.conn().query_row(
            "SELECT id FROM boards WHERE project_id = ?1 ORDER BY created_at LIMIT 1",
            [project_id],
            |row| row.get(0),
        );

        match result {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_lane(&self, board_id: &str, lane_number: i64) -> Result<Option<Lane>> {
        let result = self.db.conn().query_row(
            "SELECT id, board_id, lane_number, name FROM lanes
             WHERE board_id = ?1 AND lane_number = ?2",
            params![board_id, lane_number],
            Self::map_lane_row,
        );

        match result {
            Ok(lane) => Ok(Some(lane)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn lanes(&self, board_id: &str) -> Result<Vec<Lane>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, board_id, lane_number, name FROM lanes
             WHERE board_id = ?1 ORDER BY lane_number",
        )?;
        let lanes = stmt
            .query_map([board_id], Self::map_lane_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lanes)
    }

    fn map_lane_row(row: &rusqlite::Row) -> rusqlite::Result<Lane> {
        Ok(Lane {
            id: row.get(0)?,
            board_id: row.get(1)?,
            lane_number: row.get(2)?,
            name: row.get(3)?,
        })
    }

    // =========================================================================
    // Cards
    // =========================================================================

    /// Next position in the lane: max(position) + 1, or 0 when empty.
    pub fn next_position(&self, lane_id: &str) -> Result<i64> {
        let max: Option<i64> = self.db.conn().query_row(
            "SELECT MAX(position) FROM cards WHERE lane_id = ?1",
            [lane_id],
            |row| row.get(0),
        )?;
        Ok(max.map(|m| m + 1).unwrap_or(0))
    }

    pub fn insert_card(&self, board_id: &str, lane_id: &str, card: &NewCard) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let position = self.next_position(lane_id)?;

        self.db.conn().execute(
            "INSERT INTO cards (id, board_id, lane_id, parent_id, title, description,
                                card_type, doc_type, priority, agent, status, position,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                id,
                board_id,
                lane_id,
                card.parent_id,
                card.title,
                card.description,
                card.card_type,
                card.doc_type,
                card.priority,
                card.agent,
                card.status,
                position,
                now
            ],
        )?;

        Ok(id)
    }

    pub fn get_card(&self, card_id: &str) -> Result<Option<Card>> {
        self.query_card(
            &format!(
                "SELECT {CARD_COLUMNS} FROM cards c JOIN lanes l ON c.lane_id = l.id
                 WHERE c.id = ?1"
            ),
            params![card_id],
        )
    }

    /// Exact-title lookup used by the deduplication invariant.
    pub fn find_card_by_title(&self, board_id: &str, title: &str) -> Result<Option<Card>> {
        self.query_card(
            &format!(
                "SELECT {CARD_COLUMNS} FROM cards c JOIN lanes l ON c.lane_id = l.id
                 WHERE c.board_id = ?1 AND c.title = ?2
                 ORDER BY c.created_at LIMIT 1"
            ),
            params![board_id, title],
        )
    }

    /// Resolve a directive's card reference: id first, then exact title.
    pub fn resolve_card(&self, board_id: &str, reference: &str) -> Result<Option<Card>> {
        if let Some(card) = self.get_card(reference)? {
            if card.board_id == board_id {
                return Ok(Some(card));
            }
        }
        self.find_card_by_title(board_id, reference)
    }

    fn query_card(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Card>> {
        let result = self.db.conn().query_row(sql, params, Self::map_card_row);
        match result {
            Ok(card) => Ok(Some(card)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn map_card_row(row: &rusqlite::Row) -> rusqlite::Result<Card> {
        Ok(Card {
            id: row.get(0)?,
            board_id: row.get(1)?,
            lane_id: row.get(2)?,
            lane_number: row.get(3)?,
            parent_id: row.get(4)?,
            title: row.get(5)?,
            description: row.get(6)?,
            card_type: row.get(7)?,
            doc_type: row.get(8)?,
            priority: row.get(9)?,
            agent: row.get(10)?,
            status: row.get(11)?,
            position: row.get(12)?,
        })
    }

    pub fn cards_for_board(&self, board_id: &str) -> Result<Vec<Card>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards c JOIN lanes l ON c.lane_id = l.id
             WHERE c.board_id = ?1 ORDER BY l.lane_number, c.position"
        ))?;
        let cards = stmt
            .query_map([board_id], Self::map_card_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    pub fn cards_for_lane(&self, lane_id: &str) -> Result<Vec<Card>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards c JOIN lanes l ON c.lane_id = l.id
             WHERE c.lane_id = ?1 ORDER BY c.position"
        ))?;
        let cards = stmt
            .query_map([lane_id], Self::map_card_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    pub fn children_of(&self, card_id: &str) -> Result<Vec<Card>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards c JOIN lanes l ON c.lane_id = l.id
             WHERE c.parent_id = ?1 ORDER BY c.position"
        ))?;
        let cards = stmt
            .query_map([card_id], Self::map_card_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    /// Move a card to a new lane, repositioning at the end of the
    /// destination lane.
    pub fn move_card(&self, card_id: &str, dest_lane_id: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let position = self.next_position(dest_lane_id)?;
        self.db.conn().execute(
            "UPDATE cards SET lane_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
            params![dest_lane_id, position, now, card_id],
        )?;
        Ok(position)
    }

    /// Update a single card column by name.
    ///
    /// `field` must be one of the known mutable columns; anything else is
    /// rejected to keep the SQL injection surface closed.
    pub fn set_card_field(&self, card_id: &str, field: &str, value: &str) -> Result<()> {
        const MUTABLE: [&str; 5] = ["title", "description", "priority", "agent", "status"];
        if !MUTABLE.contains(&field) {
            anyhow::bail!("card field '{field}' is not mutable");
        }

        let now = Utc::now().to_rfc3339();
        let sql = format!("UPDATE cards SET {field} = ?1, updated_at = ?2 WHERE id = ?3");
        self.db.conn().execute(&sql, params![value, now, card_id])?;
        Ok(())
    }

    /// Review card gating the given document type, if one exists.
    pub fn find_review_card(&self, board_id: &str, doc_type: &str) -> Result<Option<Card>> {
        self.query_card(
            &format!(
                "SELECT {CARD_COLUMNS} FROM cards c JOIN lanes l ON c.lane_id = l.id
                 WHERE c.board_id = ?1 AND c.card_type = 'review' AND c.doc_type = ?2
                 ORDER BY c.created_at LIMIT 1"
            ),
            params![board_id, doc_type],
        )
    }

    // =========================================================================
    // Card history
    // =========================================================================

    /// Append a field-level audit entry.
    pub fn record_history(
        &self,
        card_id: &str,
        field: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
        actor: &str,
        reason: &str,
    ) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "INSERT INTO card_history (id, card_id, field, old_value, new_value, actor, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id, card_id, field, old_value, new_value, actor, reason, now],
        )?;
        Ok(())
    }

    pub fn history_for_card(&self, card_id: &str) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, card_id, field, old_value, new_value, actor, reason, created_at
             FROM card_history WHERE card_id = ?1 ORDER BY created_at",
        )?;
        let entries = stmt
            .query_map([card_id], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    card_id: row.get(1)?,
                    field: row.get(2)?,
                    old_value: row.get(3)?,
                    new_value: row.get(4)?,
                    actor: row.get(5)?,
                    reason: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
