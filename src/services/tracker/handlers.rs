//! Pipeline steps for the ContestantTracker
//!
//! One report flows through: flight-window filter, append, gate crossing
//! detection, state machine advance, penalty accounting, publication.

use super::ContestantTracker;
use crate::domain::types::PositionReport;
use crate::domain::score::ScoreUpdate;
use crate::services::gate_detector::{self, CrossingOutcome};
use crate::services::state_machine::{SampleSnapshot, Transition};
use crate::services::scorer;
use tracing::info;

impl ContestantTracker {
    /// Reports outside [takeoff, finished-by] are dropped with no state
    /// mutation
    pub(crate) fn in_flight_window(&self, report: &PositionReport) -> bool {
        report.device_time >= self.contestant.takeoff
            && report.device_time <= self.contestant.finished_by
    }

    /// Append one report and run detection, state machine and scoring
    pub(crate) fn handle_report(&mut self, report: PositionReport) {
        let score_before = self.score.total();

        if let Some(prev) = self.reports.last().cloned() {
            if let Some(line) = self.route.starting_line.as_mut() {
                if let Some(time) = gate_detector::detect_starting_line_crossing(line, &prev, &report)
                {
                    info!(contestant = %self.contestant.id, time = %time, "starting_line_crossed");
                    self.score.note("crossed the starting line".to_string(), time);
                }
            }

            let outcome = gate_detector::detect_crossings(
                &mut self.route.gates,
                &mut self.first_unresolved,
                &prev,
                &report,
            );
            if !outcome.crossed.is_empty() {
                self.crossed_any = true;
            }
            self.score_outcome(&outcome, &report);
        }

        self.samples.push(SampleSnapshot {
            position: report.position(),
            device_time: report.device_time,
            first_unresolved: self.first_unresolved,
            crossed_any: self.crossed_any,
            route_complete: self.first_unresolved >= self.route.gates.len(),
        });
        self.reports.push(report);

        let transitions = self.machine.advance(&self.samples, &self.route.gates);
        for transition in &transitions {
            scorer::score_transition(&mut self.score, transition, &self.route.gates);
            if let Transition::Finished { .. } = transition {
                self.notify_finished();
            }
        }

        self.score.tracking_state = self.machine.state();
        self.score.current_leg = self
            .reports
            .last()
            .and_then(|r| scorer::infer_current_leg(&self.route.gates, r.position()))
            .unwrap_or_default()
            .to_string();

        let issued = self.score.total() - score_before;
        if issued > 0.0 {
            self.metrics.record_penalty_points(issued);
        }
    }

    /// Score the gates resolved by one trajectory segment.
    ///
    /// Crossed gates are scored in route order, then foreclosed misses.
    fn score_outcome(&mut self, outcome: &CrossingOutcome, report: &PositionReport) {
        if outcome.is_empty() {
            return;
        }

        for crossing in &outcome.crossed {
            scorer::score_crossed_gate(&mut self.score, &self.route.gates[crossing.index]);
        }
        for &index in &outcome.missed {
            scorer::score_missed_gate(
                &mut self.score,
                &self.route.gates[index],
                report.device_time,
            );
        }

        self.metrics.record_gates_crossed(outcome.crossed.len() as u64);
        self.metrics.record_gates_missed(outcome.missed.len() as u64);
    }

    /// Publish the updated score snapshot to the collaborator layer
    pub(crate) fn publish(&self, update: &ScoreUpdate) {
        if let Some(ref sender) = self.egress {
            sender.send_score_update(update.clone());
        }
        self.metrics.record_update_published();
    }

    fn notify_finished(&self) {
        info!(
            contestant = %self.contestant.id,
            score = %self.score.total(),
            "track_finished"
        );
        if let Some(ref sender) = self.egress {
            sender.send_track_event(crate::io::egress_channel::TrackEventPayload {
                contest: None,
                ts: chrono::Utc::now().timestamp_millis(),
                t: "finished".to_string(),
                contestant_id: self.contestant.id.clone(),
                session: self.session.clone(),
            });
        }
    }
}
