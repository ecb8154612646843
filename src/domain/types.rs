//! Shared types for the scoring engine

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Newtype wrapper for contestant IDs to provide type safety
///
/// The contestant ID is the tracking device identifier reported on every
/// position fix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestantId(pub String);

impl std::fmt::Display for ContestantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContestantId {
    fn from(s: &str) -> Self {
        ContestantId(s.to_string())
    }
}

/// A geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One position fix from a contestant's tracking device
///
/// `device_time` is the authoritative ordering key for scoring; `server_time`
/// is only carried through for latency diagnostics.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub device_id: ContestantId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub battery_level: f64,
    /// Timestamp - can be ISO 8601 string or epoch milliseconds integer
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub device_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_timestamp_opt")]
    pub server_time: Option<DateTime<Utc>>,
    /// Ground speed in knots
    #[serde(default)]
    pub speed: f64,
    /// Course over ground in degrees
    #[serde(default)]
    pub course: f64,
}

impl PositionReport {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an ISO 8601 string or epoch milliseconds")
        }

        fn visit_str<E>(self, value: &str) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| de::Error::custom(format!("invalid timestamp {value:?}: {e}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            self.visit_i64(i64::try_from(value).map_err(de::Error::custom)?)
        }

        fn visit_i64<E>(self, value: i64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            Utc.timestamp_millis_opt(value)
                .single()
                .ok_or_else(|| de::Error::custom(format!("epoch ms out of range: {value}")))
        }

        fn visit_f64<E>(self, value: f64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            self.visit_i64(value as i64)
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}

fn deserialize_timestamp_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_timestamp")] DateTime<Utc>);

    Option::<Wrapper>::deserialize(deserializer).map(|opt| opt.map(|w| w.0))
}

/// One contestant's flight parameters, supplied once at track creation
///
/// `gate_times` holds the planned crossing time for every gate on the
/// route, derived by the planning layer from the contest start time and the
/// planned leg durations.
#[derive(Debug, Clone, Deserialize)]
pub struct Contestant {
    pub id: ContestantId,
    #[serde(default)]
    pub name: String,
    /// Reports before this device time are discarded
    pub takeoff: DateTime<Utc>,
    /// Reports after this device time are discarded
    pub finished_by: DateTime<Utc>,
    pub gate_times: std::collections::HashMap<String, DateTime<Utc>>,
}

/// Required turn direction for a procedure turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Clockwise,
    Counterclockwise,
}

impl TurnDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnDirection::Clockwise => "clockwise",
            TurnDirection::Counterclockwise => "counterclockwise",
        }
    }
}

/// Classification of the contestant's current flight behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    BeforeStart,
    Tracking,
    Backtracking,
    ProcedureTurn,
    FailedProcedureTurn,
    Deviating,
    Finished,
}

impl TrackingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingState::BeforeStart => "before_start",
            TrackingState::Tracking => "tracking",
            TrackingState::Backtracking => "backtracking",
            TrackingState::ProcedureTurn => "procedure_turn",
            TrackingState::FailedProcedureTurn => "failed_procedure_turn",
            TrackingState::Deviating => "deviating",
            TrackingState::Finished => "finished",
        }
    }

    /// Finished is terminal; no transitions leave it
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingState::Finished)
    }
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
