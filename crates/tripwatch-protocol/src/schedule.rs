use serde::{de, Deserialize, Deserializer, Serialize};

use crate::timestamp::{self, Timestamp};

/// One planned vehicle slot from the optimized schedule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub entry_time: Option<Timestamp>,
    /// Planned trip length in hours
    #[serde(default)]
    pub trip_time: Option<f64>,
    #[serde(default, deserialize_with = "numbers")]
    pub congestion: Vec<f64>,
    #[serde(default, deserialize_with = "numbers")]
    pub speed: Vec<f64>,
    #[serde(default, rename = "driverName", skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
}

/// Either shape the schedule endpoint produces: a flat list, or one list
/// per vehicle / driver.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptimizedSchedule {
    Flat(Vec<ScheduleEntry>),
    Nested(Vec<Vec<ScheduleEntry>>),
}

impl Default for OptimizedSchedule {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl OptimizedSchedule {
    /// Flatten to a single ordered list of entries
    pub fn into_entries(self) -> Vec<ScheduleEntry> {
        match self {
            OptimizedSchedule::Flat(entries) => entries,
            OptimizedSchedule::Nested(groups) => groups.into_iter().flatten().collect(),
        }
    }
}

impl<'de> Deserialize<'de> for OptimizedSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let nested = !items.is_empty() && items.iter().all(|v| v.is_array());

        if nested {
            let groups = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<Vec<ScheduleEntry>>, _>>()
                .map_err(de::Error::custom)?;
            return Ok(Self::Nested(groups));
        }

        // Mixed shapes: splice inner arrays in place
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item {
                serde_json::Value::Array(group) => {
                    for value in group {
                        entries.push(serde_json::from_value(value).map_err(de::Error::custom)?);
                    }
                }
                other => entries.push(serde_json::from_value(other).map_err(de::Error::custom)?),
            }
        }
        Ok(Self::Flat(entries))
    }
}

/// Accepts a list of numbers, a single number, or nothing.
pub(crate) fn numbers<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(|v| v.as_f64()).collect(),
        Some(serde_json::Value::Number(n)) => n.as_f64().into_iter().collect(),
        _ => Vec::new(),
    })
}
