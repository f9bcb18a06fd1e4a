//! Versioned document storage
//!
//! Documents are keyed by (project, type); each generation appends a new
//! version. Current content is the highest version.

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::documents::DocumentType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub project_id: String,
    pub doc_type: String,
    pub version: i64,
    pub content: String,
    pub created_at: String,
}

pub struct DocumentStore<'a> {
    db: &'a Database,
}

impl<'a> DocumentStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append the next version for (project, type). Returns (id, version).
    pub fn append_version(
        &self,
        project_id: &str,
        doc_type: DocumentType,
        content: &str,
    ) -> Result<(String, i64)> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let current: Option<i64> = self.db.conn().query_row(
            "SELECT MAX(version) FROM documents WHERE project_id = ?1 AND doc_type = ?2",
            params![project_id, doc_type.to_string()],
            |row| row.get(0),
        )?;
        let version = current.map(|v| v + 1).unwrap_or(1);

        self.db.conn().execute(
            "INSERT INTO documents (id, project_id, doc_type, version, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, project_id, doc_type.to_string(), version, content, now],
        )?;

        tracing::info!(
            project_id = %project_id,
            doc_type = %doc_type,
            version,
            "Stored document version"
        );

        Ok((id, version))
    }

    /// Latest version for (project, type), if any.
    pub fn latest(
        &self,
        project_id: &str,
        doc_type: DocumentType,
    ) -> Result<Option<DocumentRecord>> {
        let result = self.db.conn().query_row(
            "SELECT id, project_id, doc_type, version, content, created_at
             FROM documents WHERE project_id = ?1 AND doc_type = ?2
             ORDER BY version DESC LIMIT 1",
            params![project_id, doc_type.to_string()],
            Self::map_row,
        );

        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest version of every document type present for the project.
    pub fn latest_for_project(&self, project_id: &str) -> Result<Vec<DocumentRecord>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT d.id, d.project_id, d.doc_type, d.version, d.content, d.created_at
             FROM documents d
             JOIN (SELECT doc_type, MAX(version) AS v FROM documents
                   WHERE project_id = ?1 GROUP BY doc_type) m
               ON d.doc_type = m.doc_type AND d.version = m.v
             WHERE d.project_id = ?1
             ORDER BY d.doc_type",
        )?;
        let docs = stmt
            .query_map([project_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<DocumentRecord> {
        Ok(DocumentRecord {
            id: row.get(0)?,
            project_id: row.get(1)?,
            doc_type: row.get(2)?,
            version: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ProjectStore;

    #[test]
    fn test_versions_increment() {
        let db = Database::in_memory().unwrap();
        let project_id = ProjectStore::new(&db).create("P").unwrap();
        let store = DocumentStore::new(&db);

        let (_, v1) = store
            .append_version(&project_id, DocumentType::Blueprint, "draft one")
            .unwrap();
        let (_, v2) = store
            .append_version(&project_id, DocumentType::Blueprint, "draft two")
            .unwrap();

        assert_eq!((v1, v2), (1, 2));
        let latest = store
            .latest(&project_id, DocumentType::Blueprint)
            .unwrap()
            .unwrap();
        assert_eq!(latest.content, "draft two");
    }

    #[test]
    fn test_latest_for_project_groups_by_type() {
        let db = Database::in_memory().unwrap();
        let project_id = ProjectStore::new(&db).create("P").unwrap();
        let store = DocumentStore::new(&db);

        store
            .append_version(&project_id, DocumentType::Blueprint, "b1")
            .unwrap();
        store
            .append_version(&project_id, DocumentType::Blueprint, "b2")
            .unwrap();
        store
            .append_version(&project_id, DocumentType::Prd, "p1")
            .unwrap();

        let docs = store.latest_for_project(&project_id).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().any(|d| d.content == "b2"));
    }
}
