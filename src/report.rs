//! Plain-text rendering of compliance results.

use crate::core::{DailySnapshot, WindowSummary};

/// Shown when a participant has no activity to summarize yet.
pub const NO_DATA_MESSAGE: &str = "Not enough data yet: no feed activity has been recorded.";

/// Render a progress report for one participant.
pub fn render_progress(summary: &WindowSummary) -> String {
    let mut out = format!(
        "Progress for {}\n\
         Active days: {}/{} (window of {} days)\n",
        summary.participant_id, summary.active_days, summary.required_active_days, summary.window_days,
    );

    if summary.active_days >= summary.required_active_days {
        out.push_str("Requirement met. Keep it up!\n");
    } else if summary.on_track {
        out.push_str(&format!(
            "On track: {} more active day(s) needed.\n",
            summary.active_days_missing()
        ));
    } else {
        out.push_str("Off track: the requirement can no longer be reached in this window.\n");
    }

    out.push('\n');
    out.push_str(&render_days(&summary.snapshots));
    out
}

/// Render one line per study day.
pub fn render_days(snapshots: &[DailySnapshot]) -> String {
    snapshots
        .iter()
        .map(|snap| {
            format!(
                "{} {} retrievals: {:>3}  engagements: {:>3}{}\n",
                if snap.active_day { "[x]" } else { "[ ]" },
                snap.study_day.format("%Y-%m-%d"),
                snap.retrievals,
                snap.engagements,
                format_breakdown(snap),
            )
        })
        .collect()
}

fn format_breakdown(snap: &DailySnapshot) -> String {
    if snap.engagement_breakdown.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = snap
        .engagement_breakdown
        .iter()
        .map(|(category, count)| format!("{category}={count}"))
        .collect();
    format!("  ({})", parts.join(", "))
}

/// One-line status used by batch listings.
pub fn status_line(summary: &WindowSummary) -> String {
    format!(
        "{}: {}/{} active days ({})",
        summary.participant_id,
        summary.active_days,
        summary.required_active_days,
        if summary.on_track { "on-track" } else { "off-track" }
    )
}
