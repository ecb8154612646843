//! Gate crossing detection
//!
//! Given the two most recent position reports (the trajectory segment) and
//! the gates not yet resolved, determine which gate(s) were just crossed.
//!
//! Crossing a gate forecloses every earlier unresolved gate: a pilot who
//! cuts a corner past a gate without an exact line crossing must not leave
//! the detector waiting forever. The scan runs as an explicit two-phase
//! pass - find intersections, then mark everything below the highest
//! crossed index missed.

use crate::domain::geo;
use crate::domain::route::{Gate, StartingLine};
use crate::domain::types::{GeoPoint, PositionReport};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// A gate resolved as crossed in this pass
#[derive(Debug, Clone, PartialEq)]
pub struct CrossedGate {
    /// Route index of the gate
    pub index: usize,
    /// Interpolated crossing time
    pub time: DateTime<Utc>,
}

/// Gates resolved by one trajectory segment
#[derive(Debug, Clone, Default)]
pub struct CrossingOutcome {
    /// Crossed gates in ascending route order
    pub crossed: Vec<CrossedGate>,
    /// Route indices of gates foreclosed as missed, ascending
    pub missed: Vec<usize>,
}

impl CrossingOutcome {
    pub fn is_empty(&self) -> bool {
        self.crossed.is_empty() && self.missed.is_empty()
    }
}

/// Test the trajectory segment `prev -> current` against every unresolved
/// gate and resolve crossings and foreclosed misses.
///
/// `first_unresolved` is the cursor to the lowest-indexed unresolved gate;
/// it only ever advances. Once any gate is crossed, every unresolved gate
/// with a lower route index is marked missed, so gates 0..k-1 are always
/// resolved once gate k is.
pub fn detect_crossings(
    gates: &mut [Gate],
    first_unresolved: &mut usize,
    prev: &PositionReport,
    current: &PositionReport,
) -> CrossingOutcome {
    let mut outcome = CrossingOutcome::default();
    if *first_unresolved >= gates.len() {
        return outcome;
    }

    // Phase one: scan unresolved gates in reverse route order for an
    // intersection with the trajectory segment.
    for index in (*first_unresolved..gates.len()).rev() {
        let gate = &gates[index];
        if gate.is_resolved() {
            continue;
        }

        if let Some(time) = segment_crossing_time(gate.line, prev, current) {
            outcome.crossed.push(CrossedGate { index, time });
        }
    }
    outcome.crossed.reverse(); // ascending route order

    // Phase two: the highest crossed index forecloses every unresolved
    // gate below it that was not itself crossed in this pass.
    if let Some(highest) = outcome.crossed.last().map(|c| c.index) {
        for index in *first_unresolved..highest {
            if !gates[index].is_resolved()
                && !outcome.crossed.iter().any(|c| c.index == index)
            {
                outcome.missed.push(index);
            }
        }
    }

    for crossing in &outcome.crossed {
        gates[crossing.index].resolve_crossed(crossing.time);
        debug!(
            gate = %gates[crossing.index].name,
            time = %crossing.time,
            "gate_crossed"
        );
    }
    for &index in &outcome.missed {
        gates[index].resolve_missed();
        debug!(gate = %gates[index].name, "gate_missed");
    }

    while *first_unresolved < gates.len() && gates[*first_unresolved].is_resolved() {
        *first_unresolved += 1;
    }

    outcome
}

/// Test the trajectory segment against the virtual extended starting line.
///
/// Unlike route gates the starting line may be crossed any number of times;
/// each crossing is recorded on the line.
pub fn detect_starting_line_crossing(
    line: &mut StartingLine,
    prev: &PositionReport,
    current: &PositionReport,
) -> Option<DateTime<Utc>> {
    let time = segment_crossing_time(line.line, prev, current)?;
    line.record_crossing(time);
    Some(time)
}

/// Where and when the trajectory segment crosses a gate line, if it does.
///
/// The intersection test runs in a local planar frame anchored at the gate
/// line midpoint; the crossing time interpolates the two device timestamps
/// by the fractional position along the trajectory segment. Degenerate
/// geometry yields no crossing.
fn segment_crossing_time(
    line: [GeoPoint; 2],
    prev: &PositionReport,
    current: &PositionReport,
) -> Option<DateTime<Utc>> {
    let reference = GeoPoint::new(
        (line[0].latitude + line[1].latitude) / 2.0,
        (line[0].longitude + line[1].longitude) / 2.0,
    );

    let p1 = geo::to_local(reference, prev.position());
    let p2 = geo::to_local(reference, current.position());
    let q1 = geo::to_local(reference, line[0]);
    let q2 = geo::to_local(reference, line[1]);

    let hit = geo::segment_intersection(p1, p2, q1, q2)?;
    let t = geo::fraction_along(p1, p2, hit);

    let span_ms = (current.device_time - prev.device_time).num_milliseconds() as f64;
    Some(prev.device_time + Duration::milliseconds((span_ms * t).round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::route::{GateDefinition, GateState, Route, RouteDefinition};
    use crate::domain::types::ContestantId;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn report(lat: f64, lon: f64, secs: u32) -> PositionReport {
        PositionReport {
            device_id: ContestantId::from("dev-1"),
            latitude: lat,
            longitude: lon,
            altitude: 300.0,
            battery_level: 100.0,
            device_time: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, secs).unwrap(),
            server_time: None,
            speed: 80.0,
            course: 0.0,
        }
    }

    /// Route flying north along 10E with gates at successive latitudes
    fn route(latitudes: &[f64]) -> Route {
        let gates = latitudes
            .iter()
            .enumerate()
            .map(|(i, &lat)| GateDefinition {
                name: format!("G{i}"),
                latitude: lat,
                longitude: 10.0,
                line: [[lat, 9.99], [lat, 10.01]],
                gate_type: None,
                width_nm: None,
                turning_point: true,
                distance_from_previous_m: 0.0,
                bearing_to_next_deg: None,
                procedure_turn: false,
                turn_direction: None,
            })
            .collect();

        let times: HashMap<_, _> = (0..latitudes.len())
            .map(|i| (format!("G{i}"), Utc.with_ymd_and_hms(2024, 6, 1, 9, i as u32, 0).unwrap()))
            .collect();

        let definition =
            RouteDefinition { name: "test".to_string(), gates, starting_line: None };
        Route::build(&definition, &times).unwrap()
    }

    #[test]
    fn test_single_crossing_interpolates_time() {
        let mut route = route(&[60.0]);
        let mut cursor = 0;

        let prev = report(59.995, 10.0, 0);
        let current = report(60.005, 10.0, 10);
        let outcome = detect_crossings(&mut route.gates, &mut cursor, &prev, &current);

        assert_eq!(outcome.crossed.len(), 1);
        assert!(outcome.missed.is_empty());
        // Gate sits halfway along the segment: crossing at t0 + 5s
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 5).unwrap();
        assert_eq!(outcome.crossed[0].time, expected);
        assert_eq!(route.gates[0].state(), GateState::Crossed(expected));
        assert_eq!(cursor, 1);
    }

    #[test]
    fn test_no_crossing_leaves_gates_unresolved() {
        let mut route = route(&[60.0]);
        let mut cursor = 0;

        let prev = report(59.9, 10.0, 0);
        let current = report(59.95, 10.0, 10);
        let outcome = detect_crossings(&mut route.gates, &mut cursor, &prev, &current);

        assert!(outcome.is_empty());
        assert!(!route.gates[0].is_resolved());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_crossing_later_gate_forecloses_skipped_gates() {
        let mut route = route(&[60.0, 60.1, 60.2]);
        let mut cursor = 0;

        // Jump straight over the G2 line without ever crossing G0 or G1
        let prev = report(60.195, 10.0, 0);
        let current = report(60.205, 10.0, 10);
        let outcome = detect_crossings(&mut route.gates, &mut cursor, &prev, &current);

        assert_eq!(outcome.crossed.len(), 1);
        assert_eq!(outcome.crossed[0].index, 2);
        assert_eq!(outcome.missed, vec![0, 1]);
        assert_eq!(route.gates[0].state(), GateState::Missed);
        assert_eq!(route.gates[1].state(), GateState::Missed);
        assert!(matches!(route.gates[2].state(), GateState::Crossed(_)));
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_position_jump_resolves_multiple_gates_in_route_order() {
        let mut route = route(&[60.0, 60.002]);
        let mut cursor = 0;

        // One low-rate segment crossing both gate lines
        let prev = report(59.999, 10.0, 0);
        let current = report(60.003, 10.0, 8);
        let outcome = detect_crossings(&mut route.gates, &mut cursor, &prev, &current);

        assert_eq!(outcome.crossed.len(), 2);
        assert_eq!(outcome.crossed[0].index, 0);
        assert_eq!(outcome.crossed[1].index, 1);
        assert!(outcome.missed.is_empty());
        assert!(outcome.crossed[0].time <= outcome.crossed[1].time);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_degenerate_segment_is_no_crossing() {
        let mut route = route(&[60.0]);
        let mut cursor = 0;

        // Coincident fixes (aircraft parked on the gate line)
        let prev = report(60.0, 10.0, 0);
        let current = report(60.0, 10.0, 10);
        let outcome = detect_crossings(&mut route.gates, &mut cursor, &prev, &current);

        assert!(outcome.is_empty());
        assert!(!route.gates[0].is_resolved());
    }

    #[test]
    fn test_resolved_gates_are_skipped() {
        let mut route = route(&[60.0, 60.1]);
        let mut cursor = 0;

        let outcome = detect_crossings(
            &mut route.gates,
            &mut cursor,
            &report(59.995, 10.0, 0),
            &report(60.005, 10.0, 10),
        );
        assert_eq!(outcome.crossed.len(), 1);
        assert_eq!(cursor, 1);

        // Flying back over the same line must not re-resolve G0
        let outcome = detect_crossings(
            &mut route.gates,
            &mut cursor,
            &report(60.005, 10.0, 20),
            &report(59.995, 10.0, 30),
        );
        assert!(outcome.is_empty());
        assert_eq!(cursor, 1);
    }

    #[test]
    fn test_starting_line_crossed_repeatedly() {
        let mut line = StartingLine::new([GeoPoint::new(60.0, 9.99), GeoPoint::new(60.0, 10.01)]);

        let first =
            detect_starting_line_crossing(&mut line, &report(59.995, 10.0, 0), &report(60.005, 10.0, 10));
        assert!(first.is_some());

        let back =
            detect_starting_line_crossing(&mut line, &report(60.005, 10.0, 20), &report(59.995, 10.0, 30));
        assert!(back.is_some());

        assert_eq!(line.crossings().len(), 2);
        let miss =
            detect_starting_line_crossing(&mut line, &report(59.9, 10.0, 40), &report(59.91, 10.0, 50));
        assert!(miss.is_none());
        assert_eq!(line.crossings().len(), 2);
    }
}
