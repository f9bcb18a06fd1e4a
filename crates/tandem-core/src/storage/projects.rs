//! Project CRUD operations

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::phases::PlanningPhase;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub phase: String,
    pub style_guide: Option<String>,
}

pub struct ProjectStore<'a> {
    db: &'a Database,
}

impl<'a> ProjectStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(&self, name: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "INSERT INTO projects (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![id, name, now],
        )?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<Project>> {
        let result = self.db.conn().query_row(
            "SELECT id, name, phase, style_guide FROM projects WHERE id = ?1",
            [id],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phase: row.get(2)?,
                    style_guide: row.get(3)?,
                })
            },
        );

        match result {
            Ok(project) => Ok(Some(project)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Style-guide lookup by project id. `None` when the project has no
    /// style guide or does not exist.
    pub fn style_guide(&self, id: &str) -> Result<Option<String>> {
        let result = self.db.conn().query_row(
            "SELECT style_guide FROM projects WHERE id = ?1",
            [id],
            |row| row.get::<_, Option<String>>(0),
        );

        match result {
            Ok(guide) => Ok(guide),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_style_guide(&self, id: &str, style_guide: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "UPDATE projects SET style_guide = ?1, updated_at = ?2 WHERE id = ?3",
            params![style_guide, now, id],
        )?;
        Ok(())
    }

    /// Persist an advanced planning phase.
    pub fn set_phase(&self, id: &str, phase: PlanningPhase) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "UPDATE projects SET phase = ?1, updated_at = ?2 WHERE id = ?3",
            params![phase.to_string(), now, id],
        )?;
        Ok(())
    }
}
