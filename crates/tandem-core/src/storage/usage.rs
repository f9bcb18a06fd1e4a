//! Usage accounting sink
//!
//! Records one row per completed model call: raw token counts, provider
//! cost, and billed price.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub agent: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub price: f64,
}

/// Sink for per-call usage records. The gateway writes one record after
/// each completed model call.
pub trait UsageSink: Send + Sync {
    fn record(&self, record: &UsageRecord) -> Result<()>;
}

/// SQLite-backed usage sink.
pub struct UsageStore {
    db_path: PathBuf,
}

impl UsageStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

impl UsageSink for UsageStore {
    fn record(&self, record: &UsageRecord) -> Result<()> {
        let db = Database::new(&self.db_path)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        db.conn().execute(
            "INSERT INTO usage_records (id, agent, model, provider, input_tokens,
                                        output_tokens, cost, price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                record.agent,
                record.model,
                record.provider,
                record.input_tokens as i64,
                record.output_tokens as i64,
                record.cost,
                record.price,
                now
            ],
        )?;
        Ok(())
    }
}
