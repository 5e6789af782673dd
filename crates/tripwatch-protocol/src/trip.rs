use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::ids::{DriverId, TripId};
use crate::schedule::numbers;
use crate::timestamp::{self, Timestamp};

/// Trip lifecycle as reported by the service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Ongoing,
    Completed,
    /// Anything the service reports that isn't ongoing or completed
    #[default]
    #[serde(other)]
    Idle,
}

impl TripStatus {
    pub const ALL: [TripStatus; 3] = [TripStatus::Ongoing, TripStatus::Completed, TripStatus::Idle];

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Idle => "idle",
            TripStatus::Ongoing => "ongoing",
            TripStatus::Completed => "completed",
        }
    }

    /// Capitalized label for tables and badges
    pub fn label(&self) -> &'static str {
        match self {
            TripStatus::Idle => "Idle",
            TripStatus::Ongoing => "Ongoing",
            TripStatus::Completed => "Completed",
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            TripStatus::Ongoing => StatusTone::Success,
            TripStatus::Completed => StatusTone::Danger,
            TripStatus::Idle => StatusTone::Warning,
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge tone used when rendering a status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusTone {
    Success,
    Danger,
    Warning,
}

/// GPS sample, `[lat, lng]` on the wire
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(c: Coordinate) -> Self {
        (c.lat, c.lng)
    }
}

/// A single vehicle trip
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    #[serde(rename = "_id", alias = "id")]
    pub id: TripId,
    /// Empty when the service sent no usable driver reference
    #[serde(default, deserialize_with = "or_default")]
    pub driver_id: DriverId,
    #[serde(default, deserialize_with = "or_default")]
    pub vehicle_id: String,
    #[serde(default, deserialize_with = "or_default")]
    pub status: TripStatus,
    /// Absent while the service is still processing the trip start
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub entry_time: Option<Timestamp>,
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub end_time: Option<Timestamp>,
    /// Chronological GPS samples; the last one is the current position
    #[serde(default, deserialize_with = "coordinates")]
    pub locations: Vec<Coordinate>,
    /// Chronological speed samples in km/h
    #[serde(default, deserialize_with = "numbers")]
    pub speed: Vec<f64>,
    /// Elapsed trip time in seconds
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub trip_duration: Option<f64>,
}

impl Trip {
    pub fn new(
        id: impl Into<TripId>,
        driver_id: impl Into<DriverId>,
        vehicle_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            driver_id: driver_id.into(),
            vehicle_id: vehicle_id.into(),
            status: TripStatus::Idle,
            entry_time: None,
            end_time: None,
            locations: Vec::new(),
            speed: Vec::new(),
            trip_duration: None,
        }
    }

    pub fn last_location(&self) -> Option<Coordinate> {
        self.locations.last().copied()
    }

    pub fn last_speed(&self) -> Option<f64> {
        self.speed.last().copied()
    }

    /// Transition to completed.
    ///
    /// Sets the end time when absent, clamped so it never precedes the
    /// entry time.
    pub fn mark_completed(&mut self, at: Timestamp) {
        self.status = TripStatus::Completed;
        if self.end_time.is_none() {
            let end = match self.entry_time {
                Some(entry) if entry > at => entry,
                _ => at,
            };
            self.end_time = Some(end);
        }
    }
}

/// Anything that does not decode as `T` reads as `T::default()`
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

/// Keeps only well-formed `[lat, lng]` pairs
fn coordinates<'de, D>(deserializer: D) -> Result<Vec<Coordinate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value::<(f64, f64)>(v).ok())
            .map(Coordinate::from)
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
