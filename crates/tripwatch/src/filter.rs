//! Free-text and calendar-day trip filtering.

use time::Date;
use tripwatch_protocol::Trip;

use crate::time_format::TimeFormatter;

/// Trip field a search term is matched against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchField {
    #[default]
    Vehicle,
    Driver,
    Status,
}

impl SearchField {
    fn value<'t>(&self, trip: &'t Trip) -> &'t str {
        match self {
            SearchField::Vehicle => &trip.vehicle_id,
            SearchField::Driver => trip.driver_id.as_str(),
            SearchField::Status => trip.status.as_str(),
        }
    }
}

impl std::str::FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vehicle" | "vehicle_id" => Ok(SearchField::Vehicle),
            "driver" | "driver_id" => Ok(SearchField::Driver),
            "status" => Ok(SearchField::Status),
            other => Err(format!("unknown search field: {other}")),
        }
    }
}

/// Case-insensitive substring match on the vehicle id.
///
/// An empty or whitespace-only term matches every trip.
pub fn matches(trip: &Trip, term: &str) -> bool {
    matches_field(trip, SearchField::Vehicle, term)
}

pub fn matches_field(trip: &Trip, field: SearchField, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }
    field.value(trip).to_lowercase().contains(&term.to_lowercase())
}

/// The operator's active filter
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TripQuery {
    pub term: String,
    /// Keep only trips that entered on this local calendar day
    pub date: Option<Date>,
    pub field: SearchField,
}

impl TripQuery {
    pub fn term(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, field: SearchField) -> Self {
        self.field = field;
        self
    }

    pub fn with_date(mut self, date: Option<Date>) -> Self {
        self.date = date;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.term.trim().is_empty() && self.date.is_none()
    }

    pub fn matches(&self, trip: &Trip, fmt: &TimeFormatter) -> bool {
        if !matches_field(trip, self.field, &self.term) {
            return false;
        }
        match self.date {
            None => true,
            Some(day) => trip
                .entry_time
                .as_ref()
                .is_some_and(|entry| fmt.local_date(entry) == day),
        }
    }

    /// `{t ∈ trips : matches(t)}`, preserving order
    pub fn select(&self, trips: &[Trip], fmt: &TimeFormatter) -> Vec<Trip> {
        trips
            .iter()
            .filter(|trip| self.matches(trip, fmt))
            .cloned()
            .collect()
    }
}
