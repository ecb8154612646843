//! Historical replay
//!
//! Feeds a pre-fetched report list through the identical scoring pipeline,
//! paced by a virtual clock running at a configurable multiple of real
//! time. The pipeline is unaware of the distinction between live and
//! replayed reports.

use crate::domain::score::ScoreUpdate;
use crate::domain::types::PositionReport;
use crate::services::tracker::ContestantTracker;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Load a pre-fetched report list from a JSONL file (one report per line)
pub fn load_reports<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<PositionReport>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report file {}", path.display()))?;

    let mut reports = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let report: PositionReport = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse report on line {}", number + 1))?;
        reports.push(report);
    }
    Ok(reports)
}

/// Replay a report list through one tracker.
///
/// Gaps between device timestamps are slept through at `1/speed_factor`
/// scale; a non-positive factor replays as fast as possible. Returns the
/// last published update.
pub async fn replay_track(
    tracker: &mut ContestantTracker,
    reports: Vec<PositionReport>,
    speed_factor: f64,
) -> Option<ScoreUpdate> {
    info!(
        contestant = %tracker.contestant().id,
        reports = %reports.len(),
        speed_factor = %speed_factor,
        "replay_started"
    );

    let mut last_time: Option<DateTime<Utc>> = None;
    let mut last_update = None;

    for report in reports {
        if speed_factor > 0.0 {
            if let Some(prev) = last_time {
                let gap_ms = (report.device_time - prev).num_milliseconds().max(0) as f64;
                let wait = Duration::from_millis((gap_ms / speed_factor) as u64);
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
        }
        last_time = Some(report.device_time);
        last_update = tracker.process_report(report).or(last_update);
    }

    info!(
        contestant = %tracker.contestant().id,
        score = %tracker.score().total(),
        state = %tracker.score().tracking_state,
        "replay_finished"
    );
    last_update
}
