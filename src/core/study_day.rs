//! Study-day boundary resolution.
//!
//! A study day runs from `cutoff_hour:00` local time to `cutoff_hour:00` on the
//! following local calendar day. Every event is attributed to exactly one study
//! day, identified by the local date on which it started.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A compliance period, named by the local calendar date on which it starts.
pub type StudyDay = NaiveDate;

/// Local hour at which one study day ends and the next begins.
///
/// Always in `0..=23`; out-of-range values are rejected on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CutoffHour(u32);

impl CutoffHour {
    /// Midnight cutoff, i.e. study days coincide with local calendar days.
    pub const MIDNIGHT: CutoffHour = CutoffHour(0);

    /// Validate an hour of day.
    pub fn new(hour: u32) -> Result<Self, InvalidCutoffHour> {
        if hour > 23 {
            return Err(InvalidCutoffHour(hour));
        }
        Ok(Self(hour))
    }

    /// Parse a clock string such as `"05:00"`, `"5"` or `"17:00:00"`.
    ///
    /// Cutoffs fall on the hour, so any minute or second part must be zero.
    pub fn parse_clock(raw: &str) -> Result<Self, ClockParseError> {
        let clock = raw.trim();
        let mut parts = clock.split(':');
        let hour: u32 = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(|| ClockParseError::Malformed(clock.to_string()))?;

        for part in parts {
            let value: u32 = part
                .parse()
                .ok()
                .filter(|value| part.len() == 2 && *value < 60)
                .ok_or_else(|| ClockParseError::Malformed(clock.to_string()))?;
            if value != 0 {
                return Err(ClockParseError::NotOnTheHour(clock.to_string()));
            }
        }

        Ok(Self::new(hour)?)
    }

    pub fn hour(self) -> u32 {
        self.0
    }

    fn as_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.0, 0, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl TryFrom<u32> for CutoffHour {
    type Error = InvalidCutoffHour;

    fn try_from(hour: u32) -> Result<Self, Self::Error> {
        Self::new(hour)
    }
}

impl From<CutoffHour> for u32 {
    fn from(cutoff: CutoffHour) -> Self {
        cutoff.0
    }
}

impl fmt::Display for CutoffHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

/// Cutoff hour outside `0..=23`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cutoff hour must be between 0 and 23 (got {0})")]
pub struct InvalidCutoffHour(pub u32);

/// Clock string that does not name a valid cutoff hour.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockParseError {
    #[error("'{0}' is not a clock time such as \"05:00\"")]
    Malformed(String),

    #[error("cutoff '{0}' does not fall on the hour")]
    NotOnTheHour(String),

    #[error(transparent)]
    OutOfRange(#[from] InvalidCutoffHour),
}

/// Map a UTC instant to the study day it belongs to.
pub fn study_day_for(instant: DateTime<Utc>, tz: Tz, cutoff: CutoffHour) -> StudyDay {
    let local = instant.with_timezone(&tz);
    let day = local.date_naive();
    if local.hour() < cutoff.hour() {
        day - Duration::days(1)
    } else {
        day
    }
}

/// The UTC instant at which `day` begins.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant. A
/// local time that does not exist (DST spring-forward) is shifted by the offset
/// in effect just before the gap, which lands on the first instant after it.
pub fn study_day_start(day: StudyDay, tz: Tz, cutoff: CutoffHour) -> DateTime<Utc> {
    let local = day.and_time(cutoff.as_time());
    match tz.from_local_datetime(&local).earliest() {
        Some(start) => start.with_timezone(&Utc),
        None => {
            let before_gap = local - Duration::hours(1);
            let offset = tz.offset_from_local_datetime(&before_gap).earliest().map_or_else(
                || tz.offset_from_utc_datetime(&local).fix(),
                |offset| offset.fix(),
            );
            Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
        }
    }
}

/// Every study day from `start` to `end`, both inclusive, in ascending order.
///
/// Empty when `start > end`.
pub fn day_range(start: StudyDay, end: StudyDay) -> Vec<StudyDay> {
    start.iter_days().take_while(|day| *day <= end).collect()
}
