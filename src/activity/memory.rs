//! Vector-backed activity store.

use super::{ActivityError, ActivityStore, EngagementRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
struct Retrieval {
    participant_id: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Engagement {
    participant_id: String,
    record: EngagementRecord,
}

/// Activity held in memory, for tests and for callers that already have the
/// events loaded.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActivityStore {
    retrievals: Vec<Retrieval>,
    engagements: Vec<Engagement>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a feed retrieval.
    pub fn record_retrieval(&mut self, participant_id: &str, timestamp: DateTime<Utc>) {
        self.retrievals.push(Retrieval {
            participant_id: participant_id.to_string(),
            timestamp,
        });
    }

    /// Record an engagement of the given category.
    pub fn record_engagement(
        &mut self,
        participant_id: &str,
        timestamp: DateTime<Utc>,
        category: &str,
    ) {
        self.engagements.push(Engagement {
            participant_id: participant_id.to_string(),
            record: EngagementRecord::new(timestamp, category),
        });
    }

    /// Total number of stored events.
    pub fn len(&self) -> usize {
        self.retrievals.len() + self.engagements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActivityStore for InMemoryActivityStore {
    fn earliest_retrieval_instant(
        &self,
        participant_id: &str,
    ) -> Result<Option<DateTime<Utc>>, ActivityError> {
        Ok(self
            .retrievals
            .iter()
            .filter(|r| r.participant_id == participant_id)
            .map(|r| r.timestamp)
            .min())
    }

    fn retrieval_instants(
        &self,
        participant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ActivityError> {
        let mut instants: Vec<DateTime<Utc>> = self
            .retrievals
            .iter()
            .filter(|r| r.participant_id == participant_id)
            .map(|r| r.timestamp)
            .filter(|ts| *ts >= start && *ts < end)
            .collect();
        instants.sort();
        Ok(instants)
    }

    fn engagement_records(
        &self,
        participant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EngagementRecord>, ActivityError> {
        let mut records: Vec<EngagementRecord> = self
            .engagements
            .iter()
            .filter(|e| e.participant_id == participant_id)
            .filter(|e| e.record.timestamp >= start && e.record.timestamp < end)
            .map(|e| e.record.clone())
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    fn participants(&self) -> Result<Vec<String>, ActivityError> {
        let ids: BTreeSet<&str> = self
            .retrievals
            .iter()
            .map(|r| r.participant_id.as_str())
            .chain(self.engagements.iter().map(|e| e.participant_id.as_str()))
            .collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    fn has_activity(&self, participant_id: &str) -> Result<bool, ActivityError> {
        Ok(self.retrievals.iter().any(|r| r.participant_id == participant_id)
            || self.engagements.iter().any(|e| e.participant_id == participant_id))
    }
}
