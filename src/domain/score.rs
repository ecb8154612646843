//! Score state - penalty totals, per-gate breakdown and the audit log
//!
//! `ScoreState` is owned exclusively by one contestant tracker and mutated
//! through one serialized pipeline call per report. Totals only ever
//! increase for the lifetime of a track.

use crate::domain::types::{ContestantId, TrackingState};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// One line in the append-only score audit log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreLogEntry {
    pub points: f64,
    pub message: String,
    pub time: DateTime<Utc>,
}

/// Accumulating score for one contestant track
#[derive(Debug, Clone)]
pub struct ScoreState {
    gate_score: f64,
    track_score: f64,
    /// Per-gate penalty breakdown, keyed by gate name
    gate_penalties: FxHashMap<String, f64>,
    log: Vec<ScoreLogEntry>,
    pub tracking_state: TrackingState,
    /// Name of the most recently crossed gate
    pub last_gate: String,
    /// Advisory: name of the gate terminating the nearest leg
    pub current_leg: String,
}

impl ScoreState {
    pub fn new() -> Self {
        Self {
            gate_score: 0.0,
            track_score: 0.0,
            gate_penalties: FxHashMap::default(),
            log: Vec::with_capacity(16),
            tracking_state: TrackingState::BeforeStart,
            last_gate: String::new(),
            current_leg: String::new(),
        }
    }

    /// Total score; monotonically non-decreasing
    pub fn total(&self) -> f64 {
        self.gate_score + self.track_score
    }

    pub fn gate_score(&self) -> f64 {
        self.gate_score
    }

    pub fn track_score(&self) -> f64 {
        self.track_score
    }

    pub fn gate_penalty(&self, gate_name: &str) -> f64 {
        self.gate_penalties.get(gate_name).copied().unwrap_or(0.0)
    }

    pub fn log(&self) -> &[ScoreLogEntry] {
        &self.log
    }

    /// Apply a gate penalty (timing error or missed gate)
    pub fn apply_gate_penalty(
        &mut self,
        gate_name: &str,
        points: f64,
        message: String,
        time: DateTime<Utc>,
    ) {
        debug_assert!(points >= 0.0, "penalties never decrease the score");
        self.gate_score += points;
        *self.gate_penalties.entry(gate_name.to_string()).or_insert(0.0) += points;
        self.log.push(ScoreLogEntry { points, message, time });
    }

    /// Apply a tracking-behavior penalty (backtracking, failed procedure turn)
    pub fn apply_track_penalty(&mut self, points: f64, message: String, time: DateTime<Utc>) {
        debug_assert!(points >= 0.0, "penalties never decrease the score");
        self.track_score += points;
        self.log.push(ScoreLogEntry { points, message, time });
    }

    /// Append an informational zero-point log line
    pub fn note(&mut self, message: String, time: DateTime<Utc>) {
        self.log.push(ScoreLogEntry { points: 0.0, message, time });
    }
}

impl Default for ScoreState {
    fn default() -> Self {
        Self::new()
    }
}

/// The published score snapshot consumed by the collaborator layer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub contestant_id: ContestantId,
    /// Flight session ID (UUIDv7, stable for the lifetime of the track)
    pub session: String,
    /// Timestamp of the report that produced this update (epoch ms)
    pub ts: i64,
    pub score: f64,
    pub tracking_state: String,
    /// Gate name terminating the current leg, or empty
    pub current_leg: String,
    /// Name of the last crossed gate, or empty
    pub last_gate: String,
    pub score_log: Vec<ScoreLogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, secs).unwrap()
    }

    #[test]
    fn test_new_score_state() {
        let score = ScoreState::new();
        assert_eq!(score.total(), 0.0);
        assert_eq!(score.tracking_state, TrackingState::BeforeStart);
        assert!(score.log().is_empty());
        assert_eq!(score.current_leg, "");
    }

    #[test]
    fn test_penalties_accumulate_per_bucket() {
        let mut score = ScoreState::new();
        score.apply_gate_penalty("SP", 4.0, "passed SP 2.3s late".to_string(), at(1));
        score.apply_gate_penalty("TP1", 100.0, "missed TP1".to_string(), at(2));
        score.apply_track_penalty(200.0, "backtracking".to_string(), at(3));

        assert_eq!(score.gate_score(), 104.0);
        assert_eq!(score.track_score(), 200.0);
        assert_eq!(score.total(), 304.0);
        assert_eq!(score.gate_penalty("SP"), 4.0);
        assert_eq!(score.gate_penalty("TP1"), 100.0);
        assert_eq!(score.gate_penalty("FP"), 0.0);
        assert_eq!(score.log().len(), 3);
    }

    #[test]
    fn test_total_is_monotonic() {
        let mut score = ScoreState::new();
        let mut last = score.total();
        score.apply_gate_penalty("SP", 0.0, "passed SP on time".to_string(), at(1));
        assert!(score.total() >= last);
        last = score.total();
        score.apply_track_penalty(200.0, "backtracking".to_string(), at(2));
        assert!(score.total() >= last);
        last = score.total();
        score.note("crossed the starting line".to_string(), at(3));
        assert!(score.total() >= last);
    }

    #[test]
    fn test_score_update_serializes_camel_case() {
        let update = ScoreUpdate {
            contestant_id: ContestantId::from("dev-1"),
            session: "0190d1f0-0000-7000-8000-000000000000".to_string(),
            ts: 1717232401000,
            score: 104.0,
            tracking_state: "tracking".to_string(),
            current_leg: "TP1".to_string(),
            last_gate: "SP".to_string(),
            score_log: vec![ScoreLogEntry {
                points: 4.0,
                message: "passed SP 2.3s late".to_string(),
                time: at(1),
            }],
        };

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["contestantId"], "dev-1");
        assert_eq!(json["trackingState"], "tracking");
        assert_eq!(json["currentLeg"], "TP1");
        assert_eq!(json["lastGate"], "SP");
        assert_eq!(json["scoreLog"][0]["points"], 4.0);
    }
}
