use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Instant recorded by the trip service (entry or end of a trip)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn from_unix(seconds: i64) -> Result<Self, TimestampError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| TimestampError::OutOfRange)
    }

    /// Parse a wire timestamp.
    ///
    /// Accepts RFC 3339, RFC 2822 / HTTP-date (`Mon, 19 Oct 2026 10:00:00 GMT`)
    /// and offset-less ISO date-times, which are taken to be UTC.
    pub fn parse(s: &str) -> Result<Self, TimestampError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimestampError::Empty);
        }

        if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
            return Ok(Self(dt));
        }
        if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
            return Ok(Self(dt));
        }
        if let Some(head) = s.strip_suffix(" GMT") {
            if let Ok(dt) = OffsetDateTime::parse(&format!("{head} +0000"), &Rfc2822) {
                return Ok(Self(dt));
            }
        }

        let naive = [
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ];
        naive
            .iter()
            .find_map(|fd| PrimitiveDateTime::parse(s, *fd).ok())
            .map(|dt| Self(dt.assume_utc()))
            .ok_or_else(|| TimestampError::Unrecognized(s.to_string()))
    }

    pub fn as_offset_date_time(&self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(&self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn to_rfc3339(&self) -> String {
        // Rfc3339 formatting only fails for years outside 0..=9999
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(dt: OffsetDateTime) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Deserialize an optional timestamp, mapping anything unusable to `None`.
///
/// A trip whose entry time cannot be read is still a trip; it renders as
/// "Processing" instead of failing the whole snapshot.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Timestamp::parse(&s).ok(),
        Some(serde_json::Value::Number(n)) => {
            n.as_i64().and_then(|secs| Timestamp::from_unix(secs).ok())
        }
        _ => None,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,
    #[error("unrecognized timestamp format: {0}")]
    Unrecognized(String),
    #[error("timestamp out of range")]
    OutOfRange,
}
