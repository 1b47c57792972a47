//! Compliance Tracker - rolling-window engagement compliance for research studies.
//!
//! Participants in a study are asked to use the study app on a minimum number
//! of days within a rolling window. This library turns raw activity events
//! (feed retrievals and engagements) into a per-day record and a verdict on
//! whether the participant can still meet the requirement.
//!
//! # Study days
//!
//! A study day does not run midnight to midnight. It starts at a configurable
//! local cutoff hour, so activity shortly after midnight still counts toward
//! the previous evening.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Compliance Tracker                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Activity   │──▶│  Study-day  │──▶│   Window    │        │
//! │  │   Store     │   │  bucketing  │   │  summary    │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         ▲                                    │              │
//! │         │                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐        │
//! │  │   SQLite    │                     │   Report    │        │
//! │  │  database   │                     │   (text)    │        │
//! │  └─────────────┘                     └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use compliance_tracker::{activity::SqliteActivityStore, config::Config, core::WindowSummaryEngine};
//!
//! let config = Config::load().expect("valid configuration");
//! let settings = config.study_settings(None).expect("valid settings");
//! let store = SqliteActivityStore::open_read_only(&config.database_path).expect("database");
//!
//! let engine = WindowSummaryEngine::new(settings);
//! match engine.compute_window_summary(&store, "did:plc:example", None) {
//!     Ok(Some(summary)) => println!("{}/{}", summary.active_days, summary.required_active_days),
//!     Ok(None) => println!("{}", compliance_tracker::report::NO_DATA_MESSAGE),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod report;

// Re-export key types at crate root for convenience
pub use activity::{
    ActivityError, ActivityStore, EngagementRecord, InMemoryActivityStore, SqliteActivityStore,
};
pub use config::{Config, ConfigError, StudyRequirements, StudySettings};
pub use crate::core::{
    compute_window_summary, daily_breakdown, ComplianceError, CutoffHour, DailySnapshot,
    StudyDay, WindowSummary, WindowSummaryEngine,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
