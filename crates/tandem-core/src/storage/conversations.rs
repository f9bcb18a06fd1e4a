//! Conversation and message storage
//!
//! Conversations are created lazily on first message. Messages are
//! append-only and ordered by creation time; nothing is mutated after
//! creation except conversation status.

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub project_id: Option<String>,
    pub card_id: Option<String>,
    pub status: String,
}

use super::database::Database;

pub struct ConversationStore<'a> {
    db: &'a Database,
}

impl<'a> ConversationStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(
        &self,
        tenant_id: &str,
        project_id: Option<&str>,
        card_id: Option<&str>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "INSERT INTO conversations (id, tenant_id, project_id, card_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
            params![id, tenant_id, project_id, card_id, now],
        )?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let result = self.db.conn().query_row(
            "SELECT id, tenant_id, project_id, card_id, status FROM conversations WHERE id = ?1",
            [id],
            |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    project_id: row.get(2)?,
                    card_id: row.get(3)?,
                    status: row.get(4)?,
                })
            },
        );

        match result {
            Ok(conversation) => Ok(Some(conversation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Existing conversation, or a new one created lazily.
    pub fn get_or_create(
        &self,
        id: Option<&str>,
        tenant_id: &str,
        project_id: Option<&str>,
        card_id: Option<&str>,
    ) -> Result<String> {
        if let Some(id) = id {
            if self.get(id)?.is_some() {
                return Ok(id.to_string());
            }
        }
        self.create(tenant_id, project_id, card_id)
    }

    pub fn close(&self, id: &str) -> Result<()> {
        self.db.conn().execute(
            "UPDATE conversations SET status = 'closed' WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }

    pub fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let metadata_json = metadata.map(|m| m.to_string());
        self.db.conn().execute(
            "INSERT INTO messages (id, conversation_id, role, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, conversation_id, role.as_str(), content, metadata_json, now],
        )?;
        Ok(id)
    }

    /// Messages in creation order, newest last. `limit` keeps the prompt
    /// history bounded; pass `None` for the full transcript.
    pub fn messages(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, conversation_id, role, content, metadata, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;

        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut messages = stmt
            .query_map(params![conversation_id, limit], |row| {
                let metadata: Option<String> = row.get(4)?;
                Ok(StoredMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role: row.get(2)?,
                    content: row.get(3)?,
                    metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        messages.reverse();
        Ok(messages)
    }
}
