//! Hour-of-day bucketing that feeds the traffic chart.

use tripwatch_protocol::{Trip, TripStatus};

use crate::time_format::TimeFormatter;

pub const HOURS_PER_DAY: usize = 24;

/// Number of trips that entered during one hour of the day
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HourCount {
    pub hour: u8,
    pub count: u32,
}

pub type HourSeries = [HourCount; HOURS_PER_DAY];

fn empty_series() -> HourSeries {
    std::array::from_fn(|hour| HourCount {
        hour: hour as u8,
        count: 0,
    })
}

/// Per-status hour series
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HourBuckets {
    pub ongoing: HourSeries,
    pub completed: HourSeries,
    pub idle: HourSeries,
}

impl Default for HourBuckets {
    fn default() -> Self {
        Self {
            ongoing: empty_series(),
            completed: empty_series(),
            idle: empty_series(),
        }
    }
}

impl HourBuckets {
    pub fn series(&self, status: TripStatus) -> &HourSeries {
        match status {
            TripStatus::Ongoing => &self.ongoing,
            TripStatus::Completed => &self.completed,
            TripStatus::Idle => &self.idle,
        }
    }

    fn series_mut(&mut self, status: TripStatus) -> &mut HourSeries {
        match status {
            TripStatus::Ongoing => &mut self.ongoing,
            TripStatus::Completed => &mut self.completed,
            TripStatus::Idle => &mut self.idle,
        }
    }

    /// Trips counted across every bucket
    pub fn total(&self) -> u32 {
        TripStatus::ALL
            .iter()
            .flat_map(|status| self.series(*status).iter())
            .map(|slot| slot.count)
            .sum()
    }

    /// Largest single bucket, used to scale the chart's y axis
    pub fn peak(&self) -> u32 {
        TripStatus::ALL
            .iter()
            .flat_map(|status| self.series(*status).iter())
            .map(|slot| slot.count)
            .max()
            .unwrap_or(0)
    }
}

/// Bucket trips by the local hour of their entry time and by status.
///
/// Trips without an entry time have no hour and are left out. Unknown
/// statuses already decode as idle, so the fold is total.
pub fn aggregate<'a>(
    trips: impl IntoIterator<Item = &'a Trip>,
    fmt: &TimeFormatter,
) -> HourBuckets {
    let mut buckets = HourBuckets::default();
    for trip in trips {
        let Some(entry) = trip.entry_time.as_ref() else {
            continue;
        };
        let hour = usize::from(fmt.local_hour(entry));
        buckets.series_mut(trip.status)[hour].count += 1;
    }
    buckets
}
