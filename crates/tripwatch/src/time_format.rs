//! Timestamp and duration formatting for display.
//!
//! Two clock modes exist: [`ClockMode::Local`] reads components in the
//! observer's offset, [`ClockMode::Utc`] shows the instant exactly as the
//! service recorded it. Table and chart code uses `Local`; the schedule view
//! uses `Utc` because schedule times are planned wall-clock values.

use time::{OffsetDateTime, UtcOffset};
use tripwatch_protocol::Timestamp;

/// Placeholder for a timestamp the service hasn't filled in yet
pub const PROCESSING: &str = "Processing";

/// Placeholder for a value that cannot be computed
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockMode {
    #[default]
    Local,
    Utc,
}

/// A timestamp split into its display parts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayDateTime {
    pub date: String,
    pub time: String,
}

impl DisplayDateTime {
    pub fn processing() -> Self {
        Self {
            date: PROCESSING.to_string(),
            time: PROCESSING.to_string(),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.time == PROCESSING
    }
}

/// Formats timestamps relative to a fixed observer offset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeFormatter {
    offset: UtcOffset,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimeFormatter {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(UtcOffset::UTC)
    }

    /// Use the observer's local offset, falling back to UTC when the
    /// platform refuses to report it (e.g. multi-threaded processes on
    /// some Unix targets).
    pub fn from_system() -> Self {
        match UtcOffset::current_local_offset() {
            Ok(offset) => Self::new(offset),
            Err(e) => {
                tracing::warn!(error = %e, "local offset unavailable, formatting in UTC");
                Self::utc()
            }
        }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn format(&self, ts: Option<&Timestamp>, mode: ClockMode) -> DisplayDateTime {
        let Some(ts) = ts else {
            return DisplayDateTime::processing();
        };
        let dt = self.in_mode(ts, mode);
        DisplayDateTime {
            date: format!("{:04}-{:02}-{:02}", dt.year(), u8::from(dt.month()), dt.day()),
            time: format_clock(dt.hour(), dt.minute(), dt.second()),
        }
    }

    pub fn local(&self, ts: Option<&Timestamp>) -> DisplayDateTime {
        self.format(ts, ClockMode::Local)
    }

    pub fn utc_preserving(&self, ts: Option<&Timestamp>) -> DisplayDateTime {
        self.format(ts, ClockMode::Utc)
    }

    /// Calendar hour (0–23) of `ts` on the observer's clock
    pub fn local_hour(&self, ts: &Timestamp) -> u8 {
        self.in_mode(ts, ClockMode::Local).hour()
    }

    /// Calendar day of `ts` on the observer's clock
    pub fn local_date(&self, ts: &Timestamp) -> time::Date {
        self.in_mode(ts, ClockMode::Local).date()
    }

    fn in_mode(&self, ts: &Timestamp, mode: ClockMode) -> OffsetDateTime {
        match mode {
            ClockMode::Local => ts.0.to_offset(self.offset),
            ClockMode::Utc => ts.0.to_offset(UtcOffset::UTC),
        }
    }
}

/// `h:mm:ss AM/PM`, with both midnight and noon shown as 12
pub fn format_clock(hour: u8, minute: u8, second: u8) -> String {
    let (h12, period) = twelve_hour(hour);
    format!("{h12}:{minute:02}:{second:02} {period}")
}

fn twelve_hour(hour: u8) -> (u8, &'static str) {
    let period = if hour >= 12 { "PM" } else { "AM" };
    let h12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    (h12, period)
}

/// `"{h}h {m}m {s}s"` from a count of seconds.
///
/// Fractional seconds are truncated first; absent or non-finite input
/// yields [`NOT_AVAILABLE`].
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite()) else {
        return NOT_AVAILABLE.to_string();
    };
    let total = seconds.trunc().max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours}h {minutes}m {secs}s")
}

/// `h:mm AM/PM` from decimal hours (e.g. `13.5` → `1:30 PM`).
///
/// Minutes are rounded; values past midnight wrap onto the next day's clock.
pub fn format_decimal_hours(hours: Option<f64>) -> String {
    let Some(hours) = hours.filter(|h| h.is_finite() && *h >= 0.0) else {
        return NOT_AVAILABLE.to_string();
    };
    let total_minutes = (hours * 60.0).round() as u64;
    let hour = ((total_minutes / 60) % 24) as u8;
    let minute = total_minutes % 60;
    let (h12, period) = twelve_hour(hour);
    format!("{h12}:{minute:02} {period}")
}

/// `"{h}h {m}m"` for a planned trip length given in hours
pub fn format_trip_hours(hours: Option<f64>) -> String {
    let Some(hours) = hours.filter(|h| h.is_finite() && *h >= 0.0) else {
        return NOT_AVAILABLE.to_string();
    };
    let whole = hours.floor();
    let minutes = ((hours - whole) * 60.0).round() as u64;
    // 1.999h rounds to 60 minutes
    let (whole, minutes) = if minutes == 60 {
        (whole as u64 + 1, 0)
    } else {
        (whole as u64, minutes)
    };
    format!("{whole}h {minutes}m")
}

/// Hour of day plus minutes as a fraction, read in UTC
pub fn decimal_hours_utc(ts: &Timestamp) -> f64 {
    let dt = ts.0.to_offset(UtcOffset::UTC);
    f64::from(dt.hour()) + f64::from(dt.minute()) / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn ts(dt: OffsetDateTime) -> Timestamp {
        Timestamp(dt)
    }

    /// Parse `h:mm:ss AM/PM` back to 24h (hour, minute)
    fn reparse(clock: &str) -> (u8, u8) {
        let (hms, period) = clock.split_once(' ').unwrap();
        let mut parts = hms.split(':');
        let h: u8 = parts.next().unwrap().parse().unwrap();
        let m: u8 = parts.next().unwrap().parse().unwrap();
        let hour = match (h, period) {
            (12, "AM") => 0,
            (12, "PM") => 12,
            (h, "PM") => h + 12,
            (h, _) => h,
        };
        (hour, m)
    }

    #[test]
    fn null_is_processing() {
        let fmt = TimeFormatter::utc();
        let out = fmt.format(None, ClockMode::Local);
        assert_eq!(out.date, "Processing");
        assert_eq!(out.time, "Processing");
        assert!(out.is_processing());
        assert_eq!(fmt.format(None, ClockMode::Utc), DisplayDateTime::processing());
    }

    #[test]
    fn twelve_hour_wraparound() {
        assert_eq!(format_clock(0, 5, 9), "12:05:09 AM");
        assert_eq!(format_clock(12, 0, 0), "12:00:00 PM");
        assert_eq!(format_clock(13, 45, 1), "1:45:01 PM");
        assert_eq!(format_clock(11, 59, 59), "11:59:59 AM");
    }

    #[test]
    fn local_mode_shifts_utc_mode_does_not() {
        let fmt = TimeFormatter::new(offset!(+5:30));
        let at = ts(datetime!(2024-10-19 20:00:00 UTC));

        let local = fmt.local(Some(&at));
        assert_eq!(local.date, "2024-10-20");
        assert_eq!(local.time, "1:30:00 AM");

        let utc = fmt.utc_preserving(Some(&at));
        assert_eq!(utc.date, "2024-10-19");
        assert_eq!(utc.time, "8:00:00 PM");
    }

    #[test]
    fn utc_mode_round_trips_regardless_of_observer() {
        let at = ts(datetime!(2024-03-09 00:07:00 UTC));
        for observer in [offset!(-11), offset!(UTC), offset!(+5:45), offset!(+14)] {
            let fmt = TimeFormatter::new(observer);
            for minutes in (0..24 * 60).step_by(37) {
                let shifted = ts(at.0 + time::Duration::minutes(minutes));
                let shown = fmt.utc_preserving(Some(&shifted));
                assert_eq!(
                    reparse(&shown.time),
                    (shifted.0.hour(), shifted.0.minute()),
                    "observer {observer}"
                );
            }
        }
    }

    #[test]
    fn local_hour_uses_offset() {
        let fmt = TimeFormatter::new(offset!(-3));
        assert_eq!(fmt.local_hour(&ts(datetime!(2024-01-01 02:00:00 UTC))), 23);
        assert_eq!(
            fmt.local_date(&ts(datetime!(2024-01-01 02:00:00 UTC))),
            time::macros::date!(2023-12-31)
        );
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Some(0.0)), "0h 0m 0s");
        assert_eq!(format_duration(Some(3725.9)), "1h 2m 5s");
        assert_eq!(format_duration(Some(59.99)), "0h 0m 59s");
        assert_eq!(format_duration(Some(90_061.0)), "25h 1m 1s");
        assert_eq!(format_duration(Some(f64::NAN)), NOT_AVAILABLE);
        assert_eq!(format_duration(Some(f64::INFINITY)), NOT_AVAILABLE);
        assert_eq!(format_duration(None), NOT_AVAILABLE);
    }

    #[test]
    fn decimal_hours() {
        assert_eq!(format_decimal_hours(Some(0.0)), "12:00 AM");
        assert_eq!(format_decimal_hours(Some(13.5)), "1:30 PM");
        assert_eq!(format_decimal_hours(Some(9.999)), "10:00 AM");
        assert_eq!(format_decimal_hours(Some(25.25)), "1:15 AM");
        assert_eq!(format_decimal_hours(None), NOT_AVAILABLE);
        assert_eq!(format_decimal_hours(Some(f64::NAN)), NOT_AVAILABLE);

        assert_eq!(format_trip_hours(Some(1.5)), "1h 30m");
        assert_eq!(format_trip_hours(Some(2.0)), "2h 0m");
        assert_eq!(format_trip_hours(Some(1.999)), "2h 0m");
        assert_eq!(format_trip_hours(None), NOT_AVAILABLE);

        let at = ts(datetime!(2024-10-19 07:45:00 +02:00));
        assert!((decimal_hours_utc(&at) - 5.75).abs() < f64::EPSILON);
    }
}
