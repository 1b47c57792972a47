//! Core functionality for the compliance tracker.
//!
//! This module contains:
//! - Study-day boundary resolution under a local cutoff hour
//! - Rolling window aggregation and the on-track projection

pub mod study_day;
pub mod window;

// Re-export commonly used types
pub use study_day::{
    day_range, study_day_for, study_day_start, ClockParseError, CutoffHour, StudyDay,
};
pub use window::{
    compute_window_summary, daily_breakdown, ComplianceError, DailySnapshot, WindowSummary,
    WindowSummaryEngine,
};
