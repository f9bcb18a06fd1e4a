//! SQLite database handle with schema migrations

use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

/// SQLite database handle.
///
/// Cheap to open; callers typically construct one per unit of work and let
/// SQLite handle cross-connection consistency.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Writers may contend briefly during chat turns on the same board.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS projects (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                phase       TEXT NOT NULL DEFAULT 'welcome',
                style_guide TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS boards (
                id         TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name       TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lanes (
                id          TEXT PRIMARY KEY,
                board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                lane_number INTEGER NOT NULL,
                name        TEXT NOT NULL,
                UNIQUE (board_id, lane_number)
            );

            CREATE TABLE IF NOT EXISTS cards (
                id          TEXT PRIMARY KEY,
                board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                lane_id     TEXT NOT NULL REFERENCES lanes(id),
                parent_id   TEXT REFERENCES cards(id),
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                card_type   TEXT NOT NULL DEFAULT 'task',
                doc_type    TEXT,
                priority    TEXT NOT NULL DEFAULT 'medium',
                agent       TEXT,
                status      TEXT NOT NULL DEFAULT 'pending',
                position    INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cards_board_title ON cards(board_id, title);
            CREATE INDEX IF NOT EXISTS idx_cards_lane_position ON cards(lane_id, position);

            CREATE TABLE IF NOT EXISTS card_history (
                id         TEXT PRIMARY KEY,
                card_id    TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                field      TEXT NOT NULL,
                old_value  TEXT,
                new_value  TEXT,
                actor      TEXT NOT NULL,
                reason     TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_card_history_card ON card_history(card_id);

            CREATE TABLE IF NOT EXISTS conversations (
                id         TEXT PRIMARY KEY,
                tenant_id  TEXT NOT NULL,
                project_id TEXT,
                card_id    TEXT,
                status     TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                metadata        TEXT,
                created_at      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at);

            CREATE TABLE IF NOT EXISTS documents (
                id         TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                doc_type   TEXT NOT NULL,
                version    INTEGER NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (project_id, doc_type, version)
            );

            CREATE TABLE IF NOT EXISTS usage_records (
                id            TEXT PRIMARY KEY,
                agent         TEXT NOT NULL,
                model         TEXT NOT NULL,
                provider      TEXT NOT NULL,
                input_tokens  INTEGER NOT NULL,
                output_tokens INTEGER NOT NULL,
                cost          REAL NOT NULL,
                price         REAL NOT NULL,
                created_at    TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}
