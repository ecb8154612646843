//! Penalty accounting
//!
//! Converts gate resolutions and state-machine transition edges into point
//! penalties on the owned `ScoreState`, appending one human-readable log
//! line per application. Totals never decrease.

use crate::domain::geo;
use crate::domain::route::{Gate, GateState};
use crate::domain::score::ScoreState;
use crate::domain::types::GeoPoint;
use crate::services::state_machine::Transition;
use tracing::info;

/// Timing error within this many seconds of the expected time is free
pub const GATE_GRACE_SECONDS: f64 = 2.0;
/// Points per full second of timing error beyond the grace window
pub const GATE_POINTS_PER_SECOND: f64 = 2.0;
/// Timing penalty cap per gate
pub const GATE_MAX_TIMING_PENALTY: f64 = 100.0;
/// Flat penalty for a gate foreclosed as missed
pub const MISSED_GATE_PENALTY: f64 = 100.0;
/// One-shot penalty on the tracking -> backtracking edge
pub const BACKTRACKING_PENALTY: f64 = 200.0;
/// One-time-per-gate penalty for turning the wrong way in a procedure turn
pub const FAILED_PROCEDURE_TURN_PENALTY: f64 = 200.0;

/// Timing penalty for a crossing `diff_seconds` away from the expected time
pub fn timing_penalty(diff_seconds: f64) -> f64 {
    let diff = diff_seconds.abs();
    if diff <= GATE_GRACE_SECONDS {
        0.0
    } else {
        (diff.floor() * GATE_POINTS_PER_SECOND).min(GATE_MAX_TIMING_PENALTY)
    }
}

/// Score a gate freshly resolved as crossed
pub fn score_crossed_gate(score: &mut ScoreState, gate: &Gate) {
    let GateState::Crossed(crossing_time) = gate.state() else {
        debug_assert!(false, "score_crossed_gate on a gate that is not crossed");
        return;
    };

    let diff_seconds =
        (crossing_time - gate.expected_time).num_milliseconds() as f64 / 1000.0;
    let points = timing_penalty(diff_seconds);

    let message = if points == 0.0 {
        format!("passed gate {} on time", gate.name)
    } else if diff_seconds < 0.0 {
        format!("passed gate {} {:.1}s early", gate.name, -diff_seconds)
    } else {
        format!("passed gate {} {:.1}s late", gate.name, diff_seconds)
    };

    info!(gate = %gate.name, diff_s = %format!("{diff_seconds:.1}"), points = %points, "gate_scored");
    score.apply_gate_penalty(&gate.name, points, message, crossing_time);
    score.last_gate = gate.name.clone();
}

/// Score a gate foreclosed as missed
pub fn score_missed_gate(score: &mut ScoreState, gate: &Gate, at: chrono::DateTime<chrono::Utc>) {
    info!(gate = %gate.name, points = %MISSED_GATE_PENALTY, "gate_missed_scored");
    score.apply_gate_penalty(
        &gate.name,
        MISSED_GATE_PENALTY,
        format!("missed gate {}", gate.name),
        at,
    );
}

/// Integrate one state-machine transition edge.
///
/// Only edges carry penalties; sustained states never fire twice.
pub fn score_transition(score: &mut ScoreState, transition: &Transition, gates: &[Gate]) {
    match transition {
        Transition::EnteredBacktracking { time } => {
            info!(points = %BACKTRACKING_PENALTY, "backtracking_penalty");
            score.apply_track_penalty(BACKTRACKING_PENALTY, "backtracking".to_string(), *time);
        }
        Transition::FailedProcedureTurn { gate_index, penalized: true, time } => {
            let gate_name = &gates[*gate_index].name;
            info!(gate = %gate_name, points = %FAILED_PROCEDURE_TURN_PENALTY, "failed_procedure_turn_penalty");
            score.apply_track_penalty(
                FAILED_PROCEDURE_TURN_PENALTY,
                format!("failed procedure turn at gate {gate_name}"),
                *time,
            );
        }
        Transition::Finished { time } => {
            score.note("finished the route".to_string(), *time);
        }
        // State changes without penalties: visible through tracking_state only
        Transition::FailedProcedureTurn { penalized: false, .. }
        | Transition::EnteredTracking { .. }
        | Transition::EnteredProcedureTurn { .. }
        | Transition::EnteredDeviating { .. } => {}
    }
}

/// Advisory nearest-leg inference for display.
///
/// Considers every consecutive pair of turning points whose terminating gate
/// is still unresolved and picks the leg minimizing |cross-track distance|
/// of the latest position. Does not affect scoring.
pub fn infer_current_leg<'a>(gates: &'a [Gate], position: GeoPoint) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;

    let turning_points: Vec<&Gate> = gates.iter().filter(|g| g.turning_point).collect();
    for pair in turning_points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if to.is_resolved() {
            continue;
        }

        let offset = geo::cross_track_distance_m(from.position, to.position, position).abs();
        if best.is_none_or(|(_, current)| offset < current) {
            best = Some((&to.name, offset));
        }
    }

    best.map(|(name, _)| name)
}
