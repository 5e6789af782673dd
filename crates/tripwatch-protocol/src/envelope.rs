//! Response and request bodies wrapping the domain types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::driver::Driver;
use crate::ids::DriverId;
use crate::schedule::{OptimizedSchedule, ScheduleEntry};
use crate::timestamp::{self, Timestamp};
use crate::trip::Trip;

/// `GET /api/trips`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TripsEnvelope {
    /// Trips that fail to decode are dropped; one bad record never hides the rest
    #[serde(default, deserialize_with = "skip_invalid")]
    pub trips: Vec<Trip>,
}

/// `GET /get_drivers`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DriversEnvelope {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub drivers: Vec<Driver>,
}

/// `GET /api/optimized_schedule`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScheduleEnvelope {
    #[serde(default, deserialize_with = "any_schedule")]
    pub optimized_schedule: OptimizedSchedule,
}

impl ScheduleEnvelope {
    pub fn into_entries(self) -> Vec<ScheduleEntry> {
        self.optimized_schedule.into_entries()
    }
}

/// Body of a non-2xx response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            message: None,
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            error: None,
            message: Some(text.into()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// `POST /register_driver`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegisterDriver {
    pub name: String,
    pub vehicle_id: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterDriverReply {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// `PUT /end_trip/{id}`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EndTripReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub end_time: Option<Timestamp>,
}

fn any_schedule<'de, D>(deserializer: D) -> Result<OptimizedSchedule, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(v @ serde_json::Value::Array(_)) => match serde_json::from_value(v) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed optimized schedule");
                OptimizedSchedule::default()
            }
        },
        _ => OptimizedSchedule::default(),
    })
}

fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let items = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping undecodable record");
                None
            }
        })
        .collect())
}
