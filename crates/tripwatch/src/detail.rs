//! Display records: the trip detail view, trip table rows and driver cards.

use std::collections::HashMap;
use tripwatch_protocol::{Driver, DriverId, StatusTone, Trip, TripId, TripStatus};

use crate::api::{ApiError, TripService};
use crate::route::{RouteBuilder, RoutePlan};
use crate::time_format::{format_duration, DisplayDateTime, TimeFormatter, NOT_AVAILABLE};

pub const UNKNOWN_DRIVER: &str = "Unknown Driver";

/// Shown for contact fields a driver left blank
pub const NOT_PROVIDED: &str = "Not Provided";

/// Avatar used when a driver has none
pub const PLACEHOLDER_AVATAR: &str = "avatars/user.png";

/// Drivers keyed by id, rebuilt from every driver snapshot.
///
/// Lookups never fail: a missing driver (list not loaded yet, or the driver
/// was removed) resolves to a fallback.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DriverDirectory {
    by_id: HashMap<String, Driver>,
}

impl DriverDirectory {
    pub fn from_drivers(drivers: impl IntoIterator<Item = Driver>) -> Self {
        let by_id = drivers
            .into_iter()
            .map(|d| (d.driver_id.as_str().to_string(), d))
            .collect();
        Self { by_id }
    }

    pub fn get(&self, driver_id: &str) -> Option<&Driver> {
        self.by_id.get(driver_id)
    }

    pub fn name_of(&self, driver_id: &str) -> &str {
        self.get(driver_id)
            .map(|d| d.name.as_str())
            .unwrap_or(UNKNOWN_DRIVER)
    }

    /// Avatar reference, if the driver exists and has one
    pub fn avatar_of(&self, driver_id: &str) -> Option<&str> {
        self.get(driver_id).and_then(|d| d.avatar.as_deref())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Everything the trip detail view shows
#[derive(Clone, Debug, PartialEq)]
pub struct TripDetail {
    pub id: TripId,
    pub driver_name: String,
    pub vehicle_id: String,
    pub status: TripStatus,
    pub started: DisplayDateTime,
    pub ended: DisplayDateTime,
    pub last_speed: Option<f64>,
    pub duration: String,
    pub route: RoutePlan,
}

impl TripDetail {
    pub fn compose(
        trip: &Trip,
        drivers: &DriverDirectory,
        fmt: &TimeFormatter,
        routes: &RouteBuilder,
    ) -> Self {
        Self {
            id: trip.id.clone(),
            driver_name: drivers.name_of(trip.driver_id.as_str()).to_string(),
            vehicle_id: trip.vehicle_id.clone(),
            status: trip.status,
            started: fmt.local(trip.entry_time.as_ref()),
            ended: fmt.local(trip.end_time.as_ref()),
            last_speed: trip.last_speed(),
            duration: format_duration(trip.trip_duration),
            route: routes.build(&trip.locations),
        }
    }

    pub fn last_speed_label(&self) -> String {
        match self.last_speed {
            Some(kmh) if kmh.is_finite() => format!("{kmh:.1} km/h"),
            _ => NOT_AVAILABLE.to_string(),
        }
    }
}

/// Fetch one trip and the driver list concurrently and compose the detail.
///
/// A failed driver fetch only degrades the driver name to the fallback.
pub async fn load_trip_detail(
    service: &dyn TripService,
    id: &TripId,
    fmt: &TimeFormatter,
    routes: &RouteBuilder,
) -> Result<TripDetail, ApiError> {
    let (trip, drivers) = tokio::join!(service.get_trip(id), service.list_drivers());

    let trip = trip?;
    let drivers = match drivers {
        Ok(drivers) => DriverDirectory::from_drivers(drivers),
        Err(e) => {
            tracing::warn!(error = %e, trip_id = %id, "driver list unavailable for detail view");
            DriverDirectory::default()
        }
    };

    Ok(TripDetail::compose(&trip, &drivers, fmt, routes))
}

/// One line of the dashboard's trip table
#[derive(Clone, Debug, PartialEq)]
pub struct TripRow {
    pub id: TripId,
    pub driver_name: String,
    pub avatar: Option<String>,
    pub vehicle_id: String,
    pub status: TripStatus,
    pub tone: StatusTone,
    pub started: String,
    pub ended: String,
    pub duration: String,
}

impl TripRow {
    pub fn project(trip: &Trip, drivers: &DriverDirectory, fmt: &TimeFormatter) -> Self {
        let driver_id = trip.driver_id.as_str();
        Self {
            id: trip.id.clone(),
            driver_name: drivers.name_of(driver_id).to_string(),
            avatar: drivers.avatar_of(driver_id).map(str::to_string),
            vehicle_id: trip.vehicle_id.clone(),
            status: trip.status,
            tone: trip.status.tone(),
            started: fmt.local(trip.entry_time.as_ref()).time,
            ended: fmt.local(trip.end_time.as_ref()).time,
            duration: format_duration(trip.trip_duration),
        }
    }
}

/// One entry of the driver roster
#[derive(Clone, Debug, PartialEq)]
pub struct DriverCard {
    pub driver_id: DriverId,
    pub name: String,
    pub avatar: String,
    pub email: String,
    pub phone: String,
    pub vehicle_id: Option<String>,
    /// Code printed under the QR image
    pub qr_code: Option<String>,
    /// Base64 PNG of the QR code, when the service rendered one
    pub qr_image: Option<String>,
}

impl DriverCard {
    pub fn project(driver: &Driver) -> Self {
        Self {
            driver_id: driver.driver_id.clone(),
            name: driver.name.clone(),
            avatar: provided(&driver.avatar).unwrap_or(PLACEHOLDER_AVATAR).to_string(),
            email: provided(&driver.email).unwrap_or(NOT_PROVIDED).to_string(),
            phone: provided(&driver.phone).unwrap_or(NOT_PROVIDED).to_string(),
            vehicle_id: provided(&driver.vehicle_id).map(str::to_string),
            qr_code: provided(&driver.qr_code).map(str::to_string),
            qr_image: provided(&driver.qr_code_image).map(str::to_string),
        }
    }

    /// Size of the decoded QR image in bytes
    pub fn qr_image_bytes(&self) -> Option<usize> {
        let encoded = self.qr_image.as_deref()?.trim_end_matches('=');
        Some(encoded.len() * 3 / 4)
    }
}

/// Blank strings count as missing
fn provided(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use tripwatch_protocol::{Coordinate, Timestamp};

    fn drivers() -> DriverDirectory {
        let mut asha = Driver::new("7", "Asha");
        asha.avatar = Some("asha.png".into());
        DriverDirectory::from_drivers([asha, Driver::new("8", "Ravi")])
    }

    fn trip() -> Trip {
        let mut trip = Trip::new("t1", "7", "KA01AB1234");
        trip.status = TripStatus::Ongoing;
        trip.entry_time = Some(Timestamp(datetime!(2024-10-19 14:03:09 UTC)));
        trip.speed = vec![20.0, 42.5];
        trip.locations = vec![Coordinate::new(12.9, 77.5), Coordinate::new(12.91, 77.52)];
        trip.trip_duration = Some(3_661.0);
        trip
    }

    #[test]
    fn composes_detail() {
        let detail =
            TripDetail::compose(&trip(), &drivers(), &TimeFormatter::utc(), &RouteBuilder::new());
        assert_eq!(detail.driver_name, "Asha");
        assert_eq!(detail.started.date, "2024-10-19");
        assert_eq!(detail.started.time, "2:03:09 PM");
        assert!(detail.ended.is_processing());
        assert_eq!(detail.last_speed, Some(42.5));
        assert_eq!(detail.last_speed_label(), "42.5 km/h");
        assert_eq!(detail.duration, "1h 1m 1s");
        assert!(detail.route.is_drawable());
    }

    #[test]
    fn unknown_driver_and_empty_speed() {
        let mut t = trip();
        t.driver_id = "999".into();
        t.speed.clear();
        t.entry_time = None;

        let detail =
            TripDetail::compose(&t, &drivers(), &TimeFormatter::utc(), &RouteBuilder::new());
        assert_eq!(detail.driver_name, UNKNOWN_DRIVER);
        assert_eq!(detail.last_speed, None);
        assert_eq!(detail.last_speed_label(), NOT_AVAILABLE);
        assert!(detail.started.is_processing());
    }

    #[test]
    fn empty_directory_is_tolerated() {
        let empty = DriverDirectory::default();
        assert!(empty.is_empty());
        assert_eq!(empty.name_of("7"), UNKNOWN_DRIVER);
        assert_eq!(empty.avatar_of("7"), None);

        let row = TripRow::project(&trip(), &empty, &TimeFormatter::utc());
        assert_eq!(row.driver_name, UNKNOWN_DRIVER);
        assert_eq!(row.avatar, None);
    }

    #[test]
    fn table_row() {
        let row = TripRow::project(&trip(), &drivers(), &TimeFormatter::utc());
        assert_eq!(row.avatar.as_deref(), Some("asha.png"));
        assert_eq!(row.tone, StatusTone::Success);
        assert_eq!(row.started, "2:03:09 PM");
        assert_eq!(row.ended, "Processing");
        assert_eq!(drivers().len(), 2);
    }

    #[test]
    fn driver_card_fills_blanks() {
        let mut asha = Driver::new("7", "Asha");
        asha.email = Some("asha@example.com".into());
        asha.phone = Some("  ".into());
        asha.qr_code = Some("QR-7".into());
        asha.qr_code_image = Some("iVBORw0KGgo=".into());

        let card = DriverCard::project(&asha);
        assert_eq!(card.email, "asha@example.com");
        assert_eq!(card.phone, NOT_PROVIDED);
        assert_eq!(card.avatar, PLACEHOLDER_AVATAR);
        assert_eq!(card.qr_code.as_deref(), Some("QR-7"));
        assert_eq!(card.qr_image_bytes(), Some(8));

        let bare = DriverCard::project(&Driver::new("8", "Ravi"));
        assert_eq!(bare.email, NOT_PROVIDED);
        assert_eq!(bare.qr_image, None);
        assert_eq!(bare.qr_image_bytes(), None);
    }
}
