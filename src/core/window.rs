//! Rolling compliance window computation.
//!
//! Retrieval and engagement events are bucketed into study days, each day is
//! judged active or not against the configured thresholds, and a running count
//! of active days is walked forward to project whether the participant can
//! still reach the requirement before the window closes.

use crate::activity::{ActivityError, ActivityStore, EngagementRecord};
use crate::config::StudySettings;
use crate::core::study_day::{day_range, study_day_for, study_day_start, StudyDay};
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One study day's activity for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub study_day: StudyDay,
    /// Feed retrievals during the day
    pub retrievals: u32,
    /// Engagements of any category during the day
    pub engagements: u32,
    /// Engagement count per category
    pub engagement_breakdown: BTreeMap<String, u32>,
    /// Whether both activity thresholds were met
    pub active_day: bool,
    /// Active days from the start of the sequence through this day
    pub cumulative_active: u32,
    /// Consecutive inactive days ending at this day (0 when active)
    pub inactive_streak: u32,
    /// Whether the requirement is still reachable as of this day
    pub on_track: bool,
}

/// Compliance result for one participant over the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub participant_id: String,
    pub snapshots: Vec<DailySnapshot>,
    pub active_days: u32,
    pub required_active_days: u32,
    pub window_days: u32,
    pub on_track: bool,
    pub computed_at: DateTime<Utc>,
}

impl WindowSummary {
    /// Snapshot for the current (possibly still open) study day.
    pub fn latest(&self) -> Option<&DailySnapshot> {
        self.snapshots.last()
    }

    /// First study day covered by the window.
    pub fn window_start(&self) -> Option<StudyDay> {
        self.snapshots.first().map(|s| s.study_day)
    }

    /// Active days still missing to meet the requirement.
    pub fn active_days_missing(&self) -> u32 {
        self.required_active_days.saturating_sub(self.active_days)
    }
}

/// Errors from the compliance entry points.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceError {
    #[error("start day {start} must be on or before end day {end}")]
    InvalidRange { start: StudyDay, end: StudyDay },

    #[error(transparent)]
    Store(#[from] ActivityError),
}

/// Stateless compliance calculator bound to one set of study settings.
#[derive(Debug, Clone)]
pub struct WindowSummaryEngine {
    settings: StudySettings,
}

impl WindowSummaryEngine {
    pub fn new(settings: StudySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StudySettings {
        &self.settings
    }

    /// The study day containing `now`.
    pub fn current_study_day(&self, now: DateTime<Utc>) -> StudyDay {
        study_day_for(now, self.settings.timezone, self.settings.cutoff_hour_local)
    }

    /// Compute the rolling window summary for a participant.
    ///
    /// Returns `Ok(None)` when the participant has no recorded retrievals; that
    /// is the normal state for a new participant, not a failure.
    pub fn compute_window_summary<S: ActivityStore + ?Sized>(
        &self,
        store: &S,
        participant_id: &str,
        now: Option<DateTime<Utc>>,
    ) -> Result<Option<WindowSummary>, ComplianceError> {
        let now = now.unwrap_or_else(Utc::now);
        let tz = self.settings.timezone;
        let cutoff = self.settings.cutoff_hour_local;
        let current_study_day = self.current_study_day(now);

        let Some(first_retrieval) = store.earliest_retrieval_instant(participant_id)? else {
            tracing::debug!(participant_id, "no retrievals recorded; no summary available");
            return Ok(None);
        };

        let first_study_day = study_day_for(first_retrieval, tz, cutoff);
        let window_floor = self.window_floor(current_study_day);
        let window_start = first_study_day.max(window_floor);

        if window_start > current_study_day {
            tracing::debug!(
                participant_id,
                %first_study_day,
                %current_study_day,
                "first retrieval falls after the current study day; no summary available"
            );
            return Ok(None);
        }

        let snapshots =
            self.collect_snapshots(store, participant_id, window_start, current_study_day)?;
        let Some((active_days, on_track)) =
            snapshots.last().map(|last| (last.cumulative_active, last.on_track))
        else {
            return Ok(None);
        };

        tracing::debug!(
            participant_id,
            %window_start,
            %current_study_day,
            days = snapshots.len(),
            active_days,
            on_track,
            "computed window summary"
        );

        Ok(Some(WindowSummary {
            participant_id: participant_id.to_string(),
            active_days,
            on_track,
            required_active_days: self.settings.required_active_days,
            window_days: self.settings.window_days,
            computed_at: now,
            snapshots,
        }))
    }

    /// Per-day breakdown over an explicit study-day range.
    ///
    /// `end_day` defaults to the current study day and `start_day` to
    /// `window_days - 1` days before `end_day`. Unlike the window summary, the
    /// range is not clipped to the participant's first activity.
    pub fn daily_breakdown<S: ActivityStore + ?Sized>(
        &self,
        store: &S,
        participant_id: &str,
        start_day: Option<StudyDay>,
        end_day: Option<StudyDay>,
        now: Option<DateTime<Utc>>,
    ) -> Result<Vec<DailySnapshot>, ComplianceError> {
        let end = match end_day {
            Some(day) => day,
            None => self.current_study_day(now.unwrap_or_else(Utc::now)),
        };
        let start = start_day.unwrap_or_else(|| self.window_floor(end));

        if start > end {
            return Err(ComplianceError::InvalidRange { start, end });
        }

        self.collect_snapshots(store, participant_id, start, end)
    }

    /// First day of a window of `window_days` days ending on `end`.
    fn window_floor(&self, end: StudyDay) -> StudyDay {
        let span = u64::from(self.settings.window_days.saturating_sub(1));
        end.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN)
    }

    /// Query, bucket and aggregate events for `[start, end]`.
    fn collect_snapshots<S: ActivityStore + ?Sized>(
        &self,
        store: &S,
        participant_id: &str,
        start: StudyDay,
        end: StudyDay,
    ) -> Result<Vec<DailySnapshot>, ComplianceError> {
        let tz = self.settings.timezone;
        let cutoff = self.settings.cutoff_hour_local;
        let range_start = study_day_start(start, tz, cutoff);
        let range_end = study_day_start(end + Duration::days(1), tz, cutoff);

        let retrievals = store.retrieval_instants(participant_id, range_start, range_end)?;
        let engagements = store.engagement_records(participant_id, range_start, range_end)?;

        let tallies = self.tally_days(&day_range(start, end), &retrievals, &engagements);
        Ok(build_snapshots(tallies, &self.settings))
    }

    /// Attribute every event to its study day.
    ///
    /// The map is seeded with every day in `days` before any event is counted,
    /// so empty days are present and events outside the range are dropped.
    fn tally_days(
        &self,
        days: &[StudyDay],
        retrievals: &[DateTime<Utc>],
        engagements: &[EngagementRecord],
    ) -> BTreeMap<StudyDay, DayTally> {
        let tz = self.settings.timezone;
        let cutoff = self.settings.cutoff_hour_local;
        let mut tallies: BTreeMap<StudyDay, DayTally> =
            days.iter().map(|day| (*day, DayTally::default())).collect();

        for instant in retrievals {
            if let Some(tally) = tallies.get_mut(&study_day_for(*instant, tz, cutoff)) {
                tally.retrievals += 1;
            }
        }

        for record in engagements {
            if let Some(tally) = tallies.get_mut(&study_day_for(record.timestamp, tz, cutoff)) {
                tally.engagements += 1;
                *tally.breakdown.entry(record.category.clone()).or_insert(0) += 1;
            }
        }

        tallies
    }
}

/// Event counts for a single study day.
#[derive(Debug, Default)]
struct DayTally {
    retrievals: u32,
    engagements: u32,
    breakdown: BTreeMap<String, u32>,
}

/// Walk the days in ascending order, accumulating active days and projecting
/// whether the requirement is still reachable.
fn build_snapshots(
    tallies: BTreeMap<StudyDay, DayTally>,
    settings: &StudySettings,
) -> Vec<DailySnapshot> {
    let mut snapshots = Vec::with_capacity(tallies.len());
    let mut cumulative_active = 0u32;
    let mut inactive_streak = 0u32;

    for (index, (study_day, tally)) in tallies.into_iter().enumerate() {
        let active_day = settings.is_active(tally.retrievals, tally.engagements);
        if active_day {
            cumulative_active += 1;
            inactive_streak = 0;
        } else {
            inactive_streak += 1;
        }

        let days_passed = index as u32 + 1;
        let remaining = settings.window_days.saturating_sub(days_passed);
        let mut potential = cumulative_active.saturating_add(remaining);
        if !active_day {
            // The day may still turn active before its cutoff passes. Applied
            // to every day, not only the open one.
            potential = potential.saturating_add(1);
        }

        snapshots.push(DailySnapshot {
            study_day,
            retrievals: tally.retrievals,
            engagements: tally.engagements,
            engagement_breakdown: tally.breakdown,
            active_day,
            cumulative_active,
            inactive_streak,
            on_track: potential >= settings.required_active_days,
        });
    }

    snapshots
}

/// Compute the rolling window summary for a participant.
///
/// See [`WindowSummaryEngine::compute_window_summary`].
pub fn compute_window_summary<S: ActivityStore + ?Sized>(
    store: &S,
    participant_id: &str,
    settings: &StudySettings,
    now: Option<DateTime<Utc>>,
) -> Result<Option<WindowSummary>, ComplianceError> {
    WindowSummaryEngine::new(settings.clone()).compute_window_summary(store, participant_id, now)
}

/// Per-day breakdown over a study-day range.
///
/// See [`WindowSummaryEngine::daily_breakdown`].
pub fn daily_breakdown<S: ActivityStore + ?Sized>(
    store: &S,
    participant_id: &str,
    settings: &StudySettings,
    start_day: Option<StudyDay>,
    end_day: Option<StudyDay>,
    now: Option<DateTime<Utc>>,
) -> Result<Vec<DailySnapshot>, ComplianceError> {
    WindowSummaryEngine::new(settings.clone()).daily_breakdown(
        store,
        participant_id,
        start_day,
        end_day,
        now,
    )
}
