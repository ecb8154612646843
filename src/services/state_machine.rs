//! Flight tracking state machine
//!
//! Classifies the contestant's current behavior from a 2-sample lookback
//! window over recent fixes. The window advances one step after each
//! evaluation rather than snapping to the latest fix, so no segment is
//! skipped even under bursty arrival.
//!
//! Penalties attach to transition edges only; a sustained state never
//! fires twice.

use crate::domain::geo;
use crate::domain::route::Gate;
use crate::domain::types::{GeoPoint, TrackingState, TurnDirection};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Heading deviations beyond this are off-course
const BACKTRACK_THRESHOLD_DEG: f64 = 90.0;

/// Per-sample record of the route situation after crossing detection ran
#[derive(Debug, Clone, Copy)]
pub struct SampleSnapshot {
    pub position: GeoPoint,
    pub device_time: DateTime<Utc>,
    /// Index of the lowest still-unresolved gate (gates.len() when done)
    pub first_unresolved: usize,
    /// Whether any gate has been resolved as crossed so far
    pub crossed_any: bool,
    /// Whether every gate on the route is resolved
    pub route_complete: bool,
}

/// A state transition edge produced by one window evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    EnteredTracking { time: DateTime<Utc> },
    EnteredProcedureTurn { gate_index: usize, time: DateTime<Utc> },
    /// Carries whether the one-time-per-gate penalty applies to this edge
    FailedProcedureTurn { gate_index: usize, penalized: bool, time: DateTime<Utc> },
    EnteredBacktracking { time: DateTime<Utc> },
    EnteredDeviating { time: DateTime<Utc> },
    Finished { time: DateTime<Utc> },
}

/// Tracking state machine with a progressive lookback window
#[derive(Debug)]
pub struct TrackingStateMachine {
    state: TrackingState,
    window_start: usize,
    /// Gates whose failed-procedure-turn penalty has already fired
    pt_penalized: FxHashSet<usize>,
}

impl TrackingStateMachine {
    pub fn new() -> Self {
        Self {
            state: TrackingState::BeforeStart,
            window_start: 0,
            pt_penalized: FxHashSet::default(),
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Advance the lookback window as far as the sample history allows,
    /// evaluating each window position once and collecting transition edges.
    pub fn advance(
        &mut self,
        samples: &[SampleSnapshot],
        gates: &[Gate],
    ) -> SmallVec<[Transition; 2]> {
        let mut transitions = SmallVec::new();

        while self.window_start + 2 < samples.len() {
            if self.state.is_terminal() {
                break;
            }
            let early = samples[self.window_start];
            let late = samples[self.window_start + 2];
            self.window_start += 1;

            if let Some(transition) = self.evaluate(early, late, gates) {
                transitions.push(transition);
            }
        }

        transitions
    }

    fn evaluate(
        &mut self,
        early: SampleSnapshot,
        late: SampleSnapshot,
        gates: &[Gate],
    ) -> Option<Transition> {
        // Nothing crossed yet relative to the window: still waiting to start
        if !late.crossed_any {
            return None;
        }

        if late.route_complete {
            self.state = TrackingState::Finished;
            return Some(Transition::Finished { time: late.device_time });
        }

        let upcoming = late.first_unresolved;
        let gate = &gates[upcoming];

        // Procedure turn flag newly true across the window
        let early_pt = gates.get(early.first_unresolved).is_some_and(|g| g.procedure_turn);
        if gate.procedure_turn && !early_pt && self.state != TrackingState::ProcedureTurn {
            self.state = TrackingState::ProcedureTurn;
            return Some(Transition::EnteredProcedureTurn {
                gate_index: upcoming,
                time: late.device_time,
            });
        }

        // Coincident window endpoints carry no heading information
        if early.position == late.position {
            return None;
        }

        let track_bearing = geo::bearing_deg(early.position, late.position);
        let diff = geo::heading_difference_deg(gate.leg_bearing_deg, track_bearing);

        if self.state == TrackingState::ProcedureTurn {
            if let Some(required) = gate.turn_direction {
                let realized = if diff > 0.0 {
                    Some(TurnDirection::Clockwise)
                } else if diff < 0.0 {
                    Some(TurnDirection::Counterclockwise)
                } else {
                    None
                };
                if realized.is_some_and(|sense| sense != required) {
                    self.state = TrackingState::FailedProcedureTurn;
                    let penalized = self.pt_penalized.insert(upcoming);
                    return Some(Transition::FailedProcedureTurn {
                        gate_index: upcoming,
                        penalized,
                        time: late.device_time,
                    });
                }
            }
            if diff.abs() <= BACKTRACK_THRESHOLD_DEG {
                self.state = TrackingState::Tracking;
                return Some(Transition::EnteredTracking { time: late.device_time });
            }
            return None; // still turning
        }

        if diff.abs() <= BACKTRACK_THRESHOLD_DEG {
            if self.state != TrackingState::Tracking {
                self.state = TrackingState::Tracking;
                return Some(Transition::EnteredTracking { time: late.device_time });
            }
            return None;
        }

        match self.state {
            TrackingState::Tracking => {
                self.state = TrackingState::Backtracking;
                Some(Transition::EnteredBacktracking { time: late.device_time })
            }
            // Off-course sustained beyond the backtracking edge
            TrackingState::Backtracking => {
                self.state = TrackingState::Deviating;
                Some(Transition::EnteredDeviating { time: late.device_time })
            }
            _ => None,
        }
    }
}

impl Default for TrackingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
