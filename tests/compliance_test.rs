//! Integration tests for window summaries over the SQLite activity store

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use compliance_tracker::{
    compute_window_summary, daily_breakdown, ComplianceError, Config, SqliteActivityStore,
    StudySettings,
};
use std::collections::BTreeMap;
use std::path::Path;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
}

fn insert_activity(
    store: &SqliteActivityStore,
    participant: &str,
    day_offset: i64,
    retrievals: usize,
    categories: &[&str],
) {
    let ts = base() + Duration::days(day_offset);
    for _ in 0..retrievals {
        store.insert_retrieval(participant, ts).unwrap();
    }
    for category in categories {
        store
            .insert_engagement(participant, ts + Duration::minutes(5), category)
            .unwrap();
    }
}

fn utc_settings(window_days: u32, required_active_days: u32) -> StudySettings {
    let config = Config {
        timezone: "UTC".to_string(),
        window_days,
        required_active_days,
        cutoff_hour_local: 0,
        ..Config::default()
    };
    config.study_settings(None).expect("valid settings")
}

fn fixture(dir: &Path) -> SqliteActivityStore {
    SqliteActivityStore::open(&dir.join("compliance.db")).expect("open fixture database")
}

#[test]
fn test_window_summary_on_track() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture(dir.path());
    let did = "did:ontrack";
    insert_activity(&store, did, 0, 1, &["like", "reply", "repost"]);
    insert_activity(&store, did, 2, 1, &["like", "repost", "like"]);
    insert_activity(&store, did, 3, 1, &["reply", "reply", "reply"]);

    let now = Utc.with_ymd_and_hms(2025, 1, 4, 18, 0, 0).unwrap();
    let summary = compute_window_summary(&store, did, &utc_settings(4, 3), Some(now))
        .unwrap()
        .expect("summary should exist");

    assert_eq!(summary.active_days, 3);
    assert!(summary.on_track);
    assert!(summary.snapshots.last().unwrap().active_day);

    let first_day = &summary.snapshots[0].engagement_breakdown;
    assert_eq!(first_day.get("like"), Some(&1));
    assert_eq!(first_day.get("reply"), Some(&1));
    assert_eq!(first_day.get("repost"), Some(&1));
}

#[test]
fn test_window_summary_off_track() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture(dir.path());
    insert_activity(&store, "did:offtrack", 0, 1, &["like", "like", "like"]);

    let now = Utc.with_ymd_and_hms(2025, 1, 4, 18, 0, 0).unwrap();
    let summary = compute_window_summary(&store, "did:offtrack", &utc_settings(4, 3), Some(now))
        .unwrap()
        .expect("summary should exist");

    assert_eq!(summary.active_days, 1);
    assert!(!summary.on_track);
}

#[test]
fn test_window_summary_none_without_activity() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture(dir.path());

    let now = Utc.with_ymd_and_hms(2025, 1, 3, 18, 0, 0).unwrap();
    let summary = compute_window_summary(&store, "did:none", &utc_settings(3, 2), Some(now)).unwrap();
    assert!(summary.is_none());
}

#[test]
fn test_breakdown_matches_exact_categories() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture(dir.path());
    insert_activity(&store, "did:a", 0, 1, &["like", "reply", "repost"]);

    let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let snapshots =
        daily_breakdown(&store, "did:a", &utc_settings(4, 3), Some(day), Some(day), None).unwrap();

    let expected: BTreeMap<String, u32> = [("like", 1), ("reply", 1), ("repost", 1)]
        .into_iter()
        .map(|(category, count)| (category.to_string(), count))
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].engagement_breakdown, expected);
}

#[test]
fn test_breakdown_rejects_inverted_range() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture(dir.path());
    insert_activity(&store, "did:a", 0, 1, &["like"]);

    let start = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let result = daily_breakdown(&store, "did:a", &utc_settings(4, 3), Some(start), Some(end), None);
    assert!(matches!(result, Err(ComplianceError::InvalidRange { .. })));
}

#[test]
fn test_local_timezone_and_cutoff_bucketing() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture(dir.path());
    // 2025-01-02 03:30 UTC is 04:30 in Amsterdam, before the 05:00 cutoff,
    // so this activity belongs to the 2025-01-01 study day.
    let late_night = Utc.with_ymd_and_hms(2025, 1, 2, 3, 30, 0).unwrap();
    store.insert_retrieval("did:nightowl", late_night).unwrap();
    for category in ["like", "like", "reply"] {
        store.insert_engagement("did:nightowl", late_night, category).unwrap();
    }

    let settings = Config::default().study_settings(None).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
    let summary = compute_window_summary(&store, "did:nightowl", &settings, Some(now))
        .unwrap()
        .unwrap();

    assert_eq!(summary.snapshots.len(), 2);
    assert_eq!(
        summary.snapshots[0].study_day,
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    );
    assert!(summary.snapshots[0].active_day);
    assert_eq!(summary.active_days, 1);
}

#[test]
fn test_read_only_store_sees_written_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compliance.db");
    {
        let writer = SqliteActivityStore::open(&path).unwrap();
        insert_activity(&writer, "did:a", 0, 1, &["like", "like", "like"]);
    }

    let reader = SqliteActivityStore::open_read_only(&path).unwrap();
    let now = base() + Duration::hours(2);
    let summary = compute_window_summary(&reader, "did:a", &utc_settings(4, 1), Some(now))
        .unwrap()
        .unwrap();
    assert_eq!(summary.active_days, 1);
    assert!(summary.on_track);
}

#[test]
fn test_summary_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture(dir.path());
    insert_activity(&store, "did:a", 0, 1, &["like", "like", "like"]);

    let now = base() + Duration::hours(2);
    let summary = compute_window_summary(&store, "did:a", &utc_settings(4, 1), Some(now))
        .unwrap()
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["participant_id"], "did:a");
    assert_eq!(json["active_days"], 1);
    assert_eq!(json["snapshots"][0]["study_day"], "2025-01-01");
    assert_eq!(json["snapshots"][0]["engagement_breakdown"]["like"], 3);
}

#[test]
fn test_study_requirements_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{
            "timezone": "UTC",
            "window_days": 4,
            "cutoff_hour_local": 0,
            "requirements": {
                "defaults": { "min_active_days": 3 },
                "strict": { "min_engagement": 5, "day_cut_off": "00:00" }
            }
        }"#,
    )
    .unwrap();
    let config = Config::load_from(&config_path).unwrap();

    let store = fixture(dir.path());
    insert_activity(&store, "did:a", 0, 1, &["like", "like", "like"]);
    let now = base() + Duration::hours(2);

    let relaxed = config.study_settings(None).unwrap();
    let summary = compute_window_summary(&store, "did:a", &relaxed, Some(now))
        .unwrap()
        .unwrap();
    assert_eq!(summary.active_days, 1);

    let strict = config.study_settings(Some("strict")).unwrap();
    assert_eq!(strict.required_active_days, 3);
    let summary = compute_window_summary(&store, "did:a", &strict, Some(now))
        .unwrap()
        .unwrap();
    assert_eq!(summary.active_days, 0);
    assert_eq!(summary.required_active_days, 3);
}
