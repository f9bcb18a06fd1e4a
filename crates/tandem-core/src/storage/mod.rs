//! Persistence layer
//!
//! SQLite-based storage for:
//! - Projects (phase, style guide)
//! - Boards, lanes, cards, card history
//! - Conversations and messages
//! - Versioned planning documents
//! - Usage accounting

mod boards;
mod conversations;
mod database;
mod documents;
mod projects;
mod usage;

pub use boards::{BoardStore, Card, HistoryEntry, Lane, NewCard, STANDARD_LANES};
pub use conversations::{Conversation, ConversationStore, MessageRole, StoredMessage};
pub use database::Database;
pub use documents::{DocumentRecord, DocumentStore};
pub use projects::{Project, ProjectStore};
pub use usage::{UsageRecord, UsageSink, UsageStore};
