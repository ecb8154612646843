//! Contestant track orchestration
//!
//! The ContestantTracker owns everything scoring needs for one contestant:
//! the gate list, the received report history, the tracking state machine
//! and the score state. Every incoming report runs the full pipeline as one
//! serialized call - crossing detection, state machine advance and penalty
//! accounting share the same ScoreState with no internal synchronization,
//! so concurrent reports for the same contestant must never interleave.

mod handlers;

use crate::domain::route::{Route, RouteDefinition};
use crate::domain::score::{ScoreState, ScoreUpdate};
use crate::domain::types::{Contestant, PositionReport};
use crate::infra::metrics::Metrics;
use crate::io::egress_channel::{EgressSender, TrackEventPayload};
use crate::services::state_machine::{SampleSnapshot, TrackingStateMachine};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

/// Per-contestant scoring pipeline
pub struct ContestantTracker {
    pub(crate) contestant: Contestant,
    pub(crate) route: Route,
    /// Received reports in arrival order
    pub(crate) reports: Vec<PositionReport>,
    /// Route situation after each report, for the lookback window
    pub(crate) samples: Vec<SampleSnapshot>,
    /// Cursor to the lowest still-unresolved gate; only advances
    pub(crate) first_unresolved: usize,
    /// Whether any gate has been resolved as crossed
    pub(crate) crossed_any: bool,
    pub(crate) machine: TrackingStateMachine,
    pub(crate) score: ScoreState,
    /// Flight session ID (UUIDv7), stable for the lifetime of the track
    pub(crate) session: String,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) egress: Option<EgressSender>,
}

impl ContestantTracker {
    /// Create a tracker for one contestant.
    ///
    /// Route construction validates the configuration (gate list, expected
    /// times); failures are fatal here and never discovered mid-stream.
    pub fn new(
        contestant: Contestant,
        definition: &RouteDefinition,
        metrics: Arc<Metrics>,
        egress: Option<EgressSender>,
    ) -> anyhow::Result<Self> {
        let route = Route::build(definition, &contestant.gate_times)
            .with_context(|| format!("failed to create track for contestant {}", contestant.id))?;

        let session = Uuid::now_v7().to_string();
        info!(
            contestant = %contestant.id,
            session = %session,
            route = %route.name,
            gates = %route.gates.len(),
            "track_created"
        );

        if let Some(ref sender) = egress {
            sender.send_track_event(TrackEventPayload {
                contest: None,
                ts: Utc::now().timestamp_millis(),
                t: "created".to_string(),
                contestant_id: contestant.id.clone(),
                session: session.clone(),
            });
        }

        Ok(Self {
            contestant,
            route,
            reports: Vec::new(),
            samples: Vec::new(),
            first_unresolved: 0,
            crossed_any: false,
            machine: TrackingStateMachine::new(),
            score: ScoreState::new(),
            session,
            metrics,
            egress,
        })
    }

    /// Start the tracker, consuming reports from the channel.
    ///
    /// Stops when the channel closes, shutdown is signalled, or the
    /// contestant's finished-by time plus the grace period has elapsed.
    pub async fn run(
        mut self,
        mut report_rx: mpsc::Receiver<PositionReport>,
        mut shutdown: watch::Receiver<bool>,
        grace_secs: u64,
    ) {
        let deadline = self.contestant.finished_by + chrono::Duration::seconds(grace_secs as i64);

        loop {
            let remaining =
                (deadline - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                report = report_rx.recv() => {
                    match report {
                        Some(r) => { self.process_report(r); }
                        None => break, // Channel closed
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(remaining) => {
                    info!(contestant = %self.contestant.id, "session_ended");
                    break;
                }
            }
        }

        if let Some(ref sender) = self.egress {
            sender.send_track_event(TrackEventPayload {
                contest: None,
                ts: Utc::now().timestamp_millis(),
                t: "session_ended".to_string(),
                contestant_id: self.contestant.id.clone(),
                session: self.session.clone(),
            });
        }
        info!(
            contestant = %self.contestant.id,
            score = %self.score.total(),
            state = %self.score.tracking_state,
            "track_closed"
        );
    }

    /// Run the full scoring pipeline for one report.
    ///
    /// Returns the published update, or None when the report falls outside
    /// the contestant's flight window and is dropped without state mutation.
    pub fn process_report(&mut self, report: PositionReport) -> Option<ScoreUpdate> {
        let process_start = Instant::now();

        if !self.in_flight_window(&report) {
            self.metrics.record_report_dropped();
            debug!(
                contestant = %self.contestant.id,
                device_time = %report.device_time,
                "report_out_of_window"
            );
            return None;
        }

        self.handle_report(report);

        let update = self.score_update();
        self.publish(&update);

        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_report_processed(latency_us);
        Some(update)
    }

    /// Build the outbound score snapshot
    pub fn score_update(&self) -> ScoreUpdate {
        let ts = self
            .reports
            .last()
            .map(|r| r.device_time)
            .unwrap_or(self.contestant.takeoff)
            .timestamp_millis();

        ScoreUpdate {
            contestant_id: self.contestant.id.clone(),
            session: self.session.clone(),
            ts,
            score: self.score.total(),
            tracking_state: self.score.tracking_state.as_str().to_string(),
            current_leg: self.score.current_leg.clone(),
            last_gate: self.score.last_gate.clone(),
            score_log: self.score.log().to_vec(),
        }
    }

    /// Render a plain-text final score report
    pub fn score_report(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "contestant {} - total {:.0} points (gates {:.0}, tracking {:.0}), state {}",
            self.contestant.id,
            self.score.total(),
            self.score.gate_score(),
            self.score.track_score(),
            self.score.tracking_state
        );
        for gate in &self.route.gates {
            let _ = writeln!(
                out,
                "  {:<10} {:<10} {:>6.0} points",
                gate.name,
                gate.state().as_str(),
                self.score.gate_penalty(&gate.name)
            );
        }
        for entry in self.score.log() {
            let _ = writeln!(out, "  [{}] {:>5.0}  {}", entry.time.format("%H:%M:%S"), entry.points, entry.message);
        }
        out
    }

    pub fn contestant(&self) -> &Contestant {
        &self.contestant
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}
