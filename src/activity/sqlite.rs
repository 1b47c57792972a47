//! SQLite-backed activity store.
//!
//! Reads the feed generator's compliance database:
//!
//! ```text
//! feed_requests(requester_did TEXT, timestamp TEXT)
//! engagements(did_engagement TEXT, timestamp TEXT, engagement_type TEXT)
//! ```
//!
//! Timestamps are ISO-8601 text. Values without an offset are taken as UTC.
//! Stored text is not normalized, so range filters and ordering compare
//! `julianday()` instants rather than strings.

use super::{ActivityError, ActivityStore, EngagementRecord};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS feed_requests (
    request_id INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_did TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS engagements (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    did_engagement TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    engagement_type TEXT
);
CREATE INDEX IF NOT EXISTS idx_feed_requests_did_ts ON feed_requests (requester_did, timestamp);
CREATE INDEX IF NOT EXISTS idx_engagements_did_ts ON engagements (did_engagement, timestamp);
";

/// Activity store over a SQLite connection.
pub struct SqliteActivityStore {
    conn: Connection,
}

impl SqliteActivityStore {
    /// Open an existing database read-only.
    pub fn open_read_only(path: &Path) -> Result<Self, ActivityError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open (or create) a writable database and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, ActivityError> {
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Create the event tables if they are missing.
    pub fn create_schema(&self) -> Result<(), ActivityError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert a feed retrieval. Used to build fixtures.
    pub fn insert_retrieval(
        &self,
        participant_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ActivityError> {
        self.conn.execute(
            "INSERT INTO feed_requests (requester_did, timestamp) VALUES (?1, ?2)",
            params![participant_id, format_timestamp(timestamp)],
        )?;
        Ok(())
    }

    /// Insert an engagement. Used to build fixtures.
    pub fn insert_engagement(
        &self,
        participant_id: &str,
        timestamp: DateTime<Utc>,
        category: &str,
    ) -> Result<(), ActivityError> {
        self.conn.execute(
            "INSERT INTO engagements (did_engagement, timestamp, engagement_type)
             VALUES (?1, ?2, ?3)",
            params![participant_id, format_timestamp(timestamp), category],
        )?;
        Ok(())
    }
}

impl ActivityStore for SqliteActivityStore {
    fn earliest_retrieval_instant(
        &self,
        participant_id: &str,
    ) -> Result<Option<DateTime<Utc>>, ActivityError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT timestamp FROM feed_requests
                 WHERE requester_did = ?1 AND julianday(timestamp) IS NOT NULL
                 ORDER BY julianday(timestamp)
                 LIMIT 1",
                params![participant_id],
                |row| row.get(0),
            )
            .optional()?;
        value.as_deref().map(parse_timestamp).transpose()
    }

    fn retrieval_instants(
        &self,
        participant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ActivityError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp FROM feed_requests
             WHERE requester_did = ?1
               AND julianday(timestamp) >= julianday(?2)
               AND julianday(timestamp) < julianday(?3)
             ORDER BY julianday(timestamp)",
        )?;
        let rows = stmt.query_map(
            params![participant_id, format_timestamp(start), format_timestamp(end)],
            |row| row.get::<_, Option<String>>(0),
        )?;

        let mut instants = Vec::new();
        for value in rows {
            let Some(value) = value? else { continue };
            let ts = parse_timestamp(&value)?;
            if ts >= start && ts < end {
                instants.push(ts);
            }
        }
        Ok(instants)
    }

    fn engagement_records(
        &self,
        participant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EngagementRecord>, ActivityError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, engagement_type FROM engagements
             WHERE did_engagement = ?1
               AND julianday(timestamp) >= julianday(?2)
               AND julianday(timestamp) < julianday(?3)
             ORDER BY julianday(timestamp)",
        )?;
        let rows = stmt.query_map(
            params![participant_id, format_timestamp(start), format_timestamp(end)],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                ))
            },
        )?;

        let mut records = Vec::new();
        for row in rows {
            // Rows missing either column are not countable engagements.
            let (Some(value), Some(category)) = row? else {
                continue;
            };
            let ts = parse_timestamp(&value)?;
            if ts >= start && ts < end {
                records.push(EngagementRecord::new(ts, category));
            }
        }
        Ok(records)
    }

    fn participants(&self) -> Result<Vec<String>, ActivityError> {
        let mut stmt = self.conn.prepare(
            "SELECT requester_did FROM feed_requests WHERE requester_did IS NOT NULL
             UNION
             SELECT did_engagement FROM engagements WHERE did_engagement IS NOT NULL
             ORDER BY 1",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn has_activity(&self, participant_id: &str) -> Result<bool, ActivityError> {
        for query in [
            "SELECT 1 FROM feed_requests WHERE requester_did = ?1 LIMIT 1",
            "SELECT 1 FROM engagements WHERE did_engagement = ?1 LIMIT 1",
        ] {
            let found = self
                .conn
                .query_row(query, params![participant_id], |_| Ok(()))
                .optional()?;
            if found.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Canonical text form used for storage and range bounds.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parse an ISO-8601 timestamp, reading offset-less values as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ActivityError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    // SQLite's own datetime() output and some exporters use a space separator
    // together with an offset.
    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| ActivityError::InvalidTimestamp {
            value: value.to_string(),
            message: err.to_string(),
        })
}
