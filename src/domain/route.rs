//! Route model - the ordered gate list derived from a route definition
//!
//! Gates are created once at track creation and are immutable except for
//! their resolution state, which transitions exactly once
//! (unresolved -> crossed or unresolved -> missed) and never reverts.

use crate::domain::geo;
use crate::domain::types::{GeoPoint, TurnDirection};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use smallvec::SmallVec;
use std::collections::HashMap;

/// One gate as authored in the route definition file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GateDefinition {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// The gate line endpoints, [[lat, lon], [lat, lon]]
    pub line: [[f64; 2]; 2],
    #[serde(default)]
    pub gate_type: Option<String>,
    #[serde(default)]
    pub width_nm: Option<f64>,
    #[serde(default)]
    pub turning_point: bool,
    #[serde(default)]
    pub distance_from_previous_m: f64,
    #[serde(default)]
    pub bearing_to_next_deg: Option<f64>,
    #[serde(default)]
    pub procedure_turn: bool,
    #[serde(default)]
    pub turn_direction: Option<TurnDirection>,
}

/// The route definition supplied by the planning layer
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDefinition {
    pub name: String,
    pub gates: Vec<GateDefinition>,
    /// Virtual extended starting line, [[lat, lon], [lat, lon]]
    #[serde(default)]
    pub starting_line: Option<[[f64; 2]; 2]>,
}

impl RouteDefinition {
    /// Load a route definition from a JSON file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read route file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse route file {}", path.display()))
    }
}

/// Resolution state of a gate; transitions exactly once and never reverts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateState {
    Unresolved,
    Crossed(DateTime<Utc>),
    Missed,
}

impl GateState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, GateState::Unresolved)
    }

    pub fn crossing_time(&self) -> Option<DateTime<Utc>> {
        match self {
            GateState::Crossed(time) => Some(*time),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Unresolved => "unresolved",
            GateState::Crossed(_) => "crossed",
            GateState::Missed => "missed",
        }
    }
}

/// One scoring checkpoint on the route
#[derive(Debug, Clone)]
pub struct Gate {
    pub name: String,
    /// Representative point (the planned turning point position)
    pub position: GeoPoint,
    /// The gate line the aircraft must cross
    pub line: [GeoPoint; 2],
    /// When this contestant is expected to cross
    pub expected_time: DateTime<Utc>,
    /// Planned bearing of the leg arriving at this gate
    pub leg_bearing_deg: f64,
    pub turning_point: bool,
    pub distance_from_previous_m: f64,
    pub bearing_to_next_deg: Option<f64>,
    pub procedure_turn: bool,
    pub turn_direction: Option<TurnDirection>,
    state: GateState,
}

impl Gate {
    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state.is_resolved()
    }

    /// Resolve the gate as crossed at the given time.
    /// The resolution state transitions exactly once.
    pub(crate) fn resolve_crossed(&mut self, time: DateTime<Utc>) {
        debug_assert!(!self.state.is_resolved(), "gate {} resolved twice", self.name);
        self.state = GateState::Crossed(time);
    }

    /// Resolve the gate as missed
    pub(crate) fn resolve_missed(&mut self) {
        debug_assert!(!self.state.is_resolved(), "gate {} resolved twice", self.name);
        self.state = GateState::Missed;
    }
}

/// The virtual extended starting line
///
/// Resolved independently of the ordered gate list; it may be crossed any
/// number of times, so every crossing is recorded with its interpolated time.
#[derive(Debug, Clone)]
pub struct StartingLine {
    pub line: [GeoPoint; 2],
    crossings: SmallVec<[DateTime<Utc>; 4]>,
}

impl StartingLine {
    pub fn new(line: [GeoPoint; 2]) -> Self {
        Self { line, crossings: SmallVec::new() }
    }

    pub fn record_crossing(&mut self, time: DateTime<Utc>) {
        self.crossings.push(time);
    }

    pub fn crossings(&self) -> &[DateTime<Utc>] {
        &self.crossings
    }
}

/// The ordered gate list for one contestant, built once at track creation
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub gates: Vec<Gate>,
    pub starting_line: Option<StartingLine>,
}

impl Route {
    /// Build the contestant's gate list from the route definition and the
    /// contestant's planned gate times.
    ///
    /// Configuration errors (zero gates, a gate without an expected time,
    /// a degenerate gate line) are fatal here, at creation time - they are
    /// never discovered mid-stream.
    pub fn build(
        definition: &RouteDefinition,
        gate_times: &HashMap<String, DateTime<Utc>>,
    ) -> anyhow::Result<Self> {
        if definition.gates.is_empty() {
            bail!("route {:?} has no gates", definition.name);
        }

        let mut gates = Vec::with_capacity(definition.gates.len());
        for (index, def) in definition.gates.iter().enumerate() {
            let expected_time = *gate_times.get(&def.name).with_context(|| {
                format!("no expected crossing time for gate {:?} in route {:?}", def.name, definition.name)
            })?;

            let line = [
                GeoPoint::new(def.line[0][0], def.line[0][1]),
                GeoPoint::new(def.line[1][0], def.line[1][1]),
            ];
            if line[0] == line[1] {
                bail!("gate {:?} has a degenerate (zero-length) gate line", def.name);
            }

            let position = GeoPoint::new(def.latitude, def.longitude);
            let leg_bearing_deg = leg_bearing(definition, index, position);

            gates.push(Gate {
                name: def.name.clone(),
                position,
                line,
                expected_time,
                leg_bearing_deg,
                turning_point: def.turning_point,
                distance_from_previous_m: def.distance_from_previous_m,
                bearing_to_next_deg: def.bearing_to_next_deg,
                procedure_turn: def.procedure_turn,
                turn_direction: def.turn_direction,
                state: GateState::Unresolved,
            });
        }

        let starting_line = definition.starting_line.map(|line| {
            StartingLine::new([
                GeoPoint::new(line[0][0], line[0][1]),
                GeoPoint::new(line[1][0], line[1][1]),
            ])
        });

        Ok(Self { name: definition.name.clone(), gates, starting_line })
    }
}

/// Planned bearing of the leg arriving at gate `index`.
///
/// Taken from the previous gate's bearing-to-next when authored, otherwise
/// computed from the two representative points. The first gate has no
/// inbound leg, so its outbound bearing is used.
fn leg_bearing(definition: &RouteDefinition, index: usize, position: GeoPoint) -> f64 {
    if index > 0 {
        let prev = &definition.gates[index - 1];
        return prev.bearing_to_next_deg.unwrap_or_else(|| {
            geo::bearing_deg(GeoPoint::new(prev.latitude, prev.longitude), position)
        });
    }

    let first = &definition.gates[0];
    match (first.bearing_to_next_deg, definition.gates.get(1)) {
        (Some(bearing), _) => bearing,
        (None, Some(next)) => {
            geo::bearing_deg(position, GeoPoint::new(next.latitude, next.longitude))
        }
        (None, None) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gate_def(name: &str, lat: f64, lon: f64) -> GateDefinition {
        GateDefinition {
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
            line: [[lat, lon - 0.01], [lat, lon + 0.01]],
            gate_type: None,
            width_nm: None,
            turning_point: true,
            distance_from_previous_m: 0.0,
            bearing_to_next_deg: None,
            procedure_turn: false,
            turn_direction: None,
        }
    }

    fn times(names: &[&str]) -> HashMap<String, DateTime<Utc>> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                (n.to_string(), Utc.with_ymd_and_hms(2024, 6, 1, 9, i as u32, 0).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_build_route() {
        let definition = RouteDefinition {
            name: "test".to_string(),
            gates: vec![gate_def("SP", 60.0, 10.0), gate_def("FP", 60.1, 10.0)],
            starting_line: None,
        };

        let route = Route::build(&definition, &times(&["SP", "FP"])).unwrap();
        assert_eq!(route.gates.len(), 2);
        assert_eq!(route.gates[0].name, "SP");
        assert!(!route.gates[0].is_resolved());
        // Leg into FP points north from SP
        assert!(route.gates[1].leg_bearing_deg.abs() < 1.0);
    }

    #[test]
    fn test_build_rejects_empty_route() {
        let definition =
            RouteDefinition { name: "empty".to_string(), gates: vec![], starting_line: None };
        assert!(Route::build(&definition, &HashMap::new()).is_err());
    }

    #[test]
    fn test_build_rejects_missing_gate_time() {
        let definition = RouteDefinition {
            name: "test".to_string(),
            gates: vec![gate_def("SP", 60.0, 10.0)],
            starting_line: None,
        };

        let err = Route::build(&definition, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("SP"));
    }

    #[test]
    fn test_build_rejects_degenerate_gate_line() {
        let mut def = gate_def("SP", 60.0, 10.0);
        def.line = [[60.0, 10.0], [60.0, 10.0]];
        let definition =
            RouteDefinition { name: "test".to_string(), gates: vec![def], starting_line: None };

        assert!(Route::build(&definition, &times(&["SP"])).is_err());
    }

    #[test]
    fn test_gate_state_transitions_once() {
        let definition = RouteDefinition {
            name: "test".to_string(),
            gates: vec![gate_def("SP", 60.0, 10.0)],
            starting_line: None,
        };
        let mut route = Route::build(&definition, &times(&["SP"])).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 30).unwrap();
        route.gates[0].resolve_crossed(at);
        assert_eq!(route.gates[0].state(), GateState::Crossed(at));
        assert_eq!(route.gates[0].state().crossing_time(), Some(at));
        assert_eq!(route.gates[0].state().as_str(), "crossed");
    }

    #[test]
    fn test_starting_line_records_multiple_crossings() {
        let mut line =
            StartingLine::new([GeoPoint::new(60.0, 9.99), GeoPoint::new(60.0, 10.01)]);
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 0).unwrap();
        line.record_crossing(t1);
        line.record_crossing(t2);
        assert_eq!(line.crossings(), &[t1, t2]);
    }

    #[test]
    fn test_route_definition_from_json() {
        let json = r#"{
            "name": "nationals day 1",
            "gates": [
                {
                    "name": "SP",
                    "latitude": 60.0,
                    "longitude": 10.0,
                    "line": [[60.0, 9.99], [60.0, 10.01]],
                    "turning_point": true,
                    "bearing_to_next_deg": 0.0,
                    "procedure_turn": true,
                    "turn_direction": "clockwise"
                }
            ],
            "starting_line": [[59.99, 9.99], [59.99, 10.01]]
        }"#;

        let definition: RouteDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.gates.len(), 1);
        assert_eq!(definition.gates[0].turn_direction, Some(TurnDirection::Clockwise));
        assert!(definition.starting_line.is_some());
    }
}
