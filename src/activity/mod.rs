//! Read access to participant activity.
//!
//! The compliance engine never touches a database directly; it is handed an
//! [`ActivityStore`] and only ever reads through it.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::InMemoryActivityStore;
pub use sqlite::SqliteActivityStore;

/// A single engagement event (like, reply, repost, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub timestamp: DateTime<Utc>,
    pub category: String,
}

impl EngagementRecord {
    pub fn new(timestamp: DateTime<Utc>, category: impl Into<String>) -> Self {
        Self {
            timestamp,
            category: category.into(),
        }
    }
}

/// Query capability over the retrieval and engagement event tables.
///
/// Range queries are half-open: `start` inclusive, `end` exclusive.
pub trait ActivityStore {
    /// Instant of the participant's first recorded retrieval, if any.
    fn earliest_retrieval_instant(
        &self,
        participant_id: &str,
    ) -> Result<Option<DateTime<Utc>>, ActivityError>;

    /// Retrieval instants within `[start, end)`.
    fn retrieval_instants(
        &self,
        participant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ActivityError>;

    /// Engagement records within `[start, end)`.
    fn engagement_records(
        &self,
        participant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EngagementRecord>, ActivityError>;

    /// Distinct participant ids with any retrieval or engagement, sorted.
    fn participants(&self) -> Result<Vec<String>, ActivityError>;

    /// Whether the participant appears in either event table.
    fn has_activity(&self, participant_id: &str) -> Result<bool, ActivityError>;
}

/// Failures raised by an activity store.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("activity database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },
}
