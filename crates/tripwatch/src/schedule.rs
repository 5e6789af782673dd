//! Read-only projection of the optimized schedule.
//!
//! Schedule times are planned wall-clock values, so they are read in UTC
//! and never shifted to the observer's offset.

use std::sync::Arc;
use tripwatch_protocol::ScheduleEntry;

use crate::api::{ApiError, TripService};
use crate::time_format::{decimal_hours_utc, format_decimal_hours, format_trip_hours, NOT_AVAILABLE};

pub const INVALID_TIME: &str = "Invalid Time";

/// One line of the schedule table
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleRow {
    /// 1-based position in the schedule
    pub position: usize,
    pub vehicle_id: Option<String>,
    pub entry: String,
    pub avg_congestion: String,
    pub trip_time: String,
    pub avg_speed: String,
    pub exit: String,
    pub driver: String,
}

impl ScheduleRow {
    pub fn project(index: usize, entry: &ScheduleEntry) -> Self {
        let entry_hours = entry.entry_time.as_ref().map(decimal_hours_utc);
        // A zero-length slot has no meaningful trip time
        let trip_hours = entry.trip_time.filter(|h| h.is_finite() && *h > 0.0);
        let exit_hours = entry_hours.zip(trip_hours).map(|(start, len)| start + len);

        Self {
            position: index + 1,
            vehicle_id: entry.vehicle_id.clone(),
            entry: match entry_hours {
                Some(hours) => format_decimal_hours(Some(hours)),
                None => INVALID_TIME.to_string(),
            },
            avg_congestion: average(&entry.congestion),
            trip_time: format_trip_hours(trip_hours),
            avg_speed: average(&entry.speed),
            exit: format_decimal_hours(exit_hours),
            driver: entry.driver_name.clone().unwrap_or_default(),
        }
    }
}

/// Mean to two decimals, `N/A` for an empty series
pub fn average(values: &[f64]) -> String {
    if values.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if !mean.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    format!("{mean:.2}")
}

pub fn project_all(entries: &[ScheduleEntry]) -> Vec<ScheduleRow> {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| ScheduleRow::project(i, e))
        .collect()
}

/// Loads and regenerates the schedule table
#[derive(Clone)]
pub struct ScheduleBoard {
    service: Arc<dyn TripService>,
}

impl ScheduleBoard {
    pub fn new(service: Arc<dyn TripService>) -> Self {
        Self { service }
    }

    pub async fn load(&self) -> Result<Vec<ScheduleRow>, ApiError> {
        let entries = self.service.optimized_schedule().await?;
        tracing::debug!(count = entries.len(), "schedule loaded");
        Ok(project_all(&entries))
    }

    /// Ask the service for a fresh schedule, then reload it
    pub async fn regenerate(&self) -> Result<Vec<ScheduleRow>, ApiError> {
        self.service.generate_schedule().await?;
        tracing::info!("schedule regenerated");
        self.load().await
    }
}
