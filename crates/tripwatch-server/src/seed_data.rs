//! Seed data for dashboard development
//!
//! A handful of drivers and a day's worth of trips in every status, with GPS
//! traces, so the dashboard has something to show without a real backend.

use time::{Duration, OffsetDateTime, Time};
use tripwatch_protocol::*;

use crate::storage::TripStore;

/// Load seed drivers, trips and an initial schedule into the store
pub fn load_seed_data(store: &TripStore) {
    for driver in seed_drivers() {
        store.insert_driver(driver);
    }
    let trips = seed_trips(OffsetDateTime::now_utc());
    let count = trips.len();
    for trip in trips {
        store.insert_trip(trip);
    }
    store.regenerate_schedule();
    tracing::info!(trips = count, "seed data loaded");
}

fn driver(id: &str, name: &str, vehicle: &str) -> Driver {
    let slug = name.to_lowercase().replace(' ', ".");
    Driver {
        email: Some(format!("{slug}@fleet.example")),
        phone: Some(format!("+91 98450 {:0>5}", id.trim_start_matches("drv-"))),
        vehicle_id: Some(vehicle.to_string()),
        qr_code: Some(format!("QR-{id}")),
        avatar: Some(format!("avatars/{slug}.png")),
        ..Driver::new(id, name)
    }
}

pub fn seed_drivers() -> Vec<Driver> {
    vec![
        driver("drv-00001", "Asha Rao", "KA01AB1234"),
        driver("drv-00002", "Ravi Kumar", "KA02CD5678"),
        driver("drv-00003", "Meera Nair", "KA03EF9012"),
        driver("drv-00004", "Imran Sheikh", "KA01GH3456"),
        driver("drv-00005", "Lakshmi Iyer", "KA05JK7890"),
    ]
}

/// Straight-ish trace of `n` samples heading out from `start`
fn trace(start: (f64, f64), heading: (f64, f64), n: usize) -> Vec<Coordinate> {
    (0..n)
        .map(|i| {
            let i = i as f64;
            // Small sideways wobble so the route isn't a ruler line
            let wobble = if (i as usize) % 2 == 0 { 0.0003 } else { -0.0003 };
            Coordinate::new(start.0 + heading.0 * i + wobble, start.1 + heading.1 * i)
        })
        .collect()
}

fn speeds(n: usize, cruise: f64) -> Vec<f64> {
    (0..n).map(|i| cruise + ((i % 3) as f64 - 1.0) * 4.0).collect()
}

struct SeedTrip {
    id: &'static str,
    driver: &'static str,
    vehicle: &'static str,
    status: TripStatus,
    /// UTC hour and minute of entry today
    entry: Option<(u8, u8)>,
    minutes: i64,
    samples: usize,
}

#[rustfmt::skip]
const SEED_TRIPS: &[SeedTrip] = &[
    SeedTrip { id: "trip-0001", driver: "drv-00001", vehicle: "KA01AB1234", status: TripStatus::Completed, entry: Some((3, 10)), minutes: 55, samples: 8 },
    SeedTrip { id: "trip-0002", driver: "drv-00002", vehicle: "KA02CD5678", status: TripStatus::Completed, entry: Some((4, 40)), minutes: 80, samples: 10 },
    SeedTrip { id: "trip-0003", driver: "drv-00003", vehicle: "KA03EF9012", status: TripStatus::Completed, entry: Some((5, 5)), minutes: 35, samples: 6 },
    SeedTrip { id: "trip-0004", driver: "drv-00001", vehicle: "KA01AB1234", status: TripStatus::Completed, entry: Some((7, 20)), minutes: 95, samples: 12 },
    SeedTrip { id: "trip-0005", driver: "drv-00004", vehicle: "KA01GH3456", status: TripStatus::Idle, entry: Some((8, 0)), minutes: 0, samples: 1 },
    SeedTrip { id: "trip-0006", driver: "drv-00005", vehicle: "KA05JK7890", status: TripStatus::Completed, entry: Some((8, 45)), minutes: 60, samples: 9 },
    SeedTrip { id: "trip-0007", driver: "drv-00002", vehicle: "KA02CD5678", status: TripStatus::Ongoing, entry: Some((9, 15)), minutes: 0, samples: 7 },
    SeedTrip { id: "trip-0008", driver: "drv-00003", vehicle: "KA03EF9012", status: TripStatus::Ongoing, entry: Some((9, 50)), minutes: 0, samples: 5 },
    SeedTrip { id: "trip-0009", driver: "drv-00005", vehicle: "KA05JK7890", status: TripStatus::Idle, entry: Some((11, 30)), minutes: 0, samples: 0 },
    SeedTrip { id: "trip-0010", driver: "drv-00004", vehicle: "KA01GH3456", status: TripStatus::Ongoing, entry: Some((12, 5)), minutes: 0, samples: 4 },
    SeedTrip { id: "trip-0011", driver: "drv-00001", vehicle: "KA01AB1234", status: TripStatus::Ongoing, entry: Some((13, 25)), minutes: 0, samples: 3 },
    // Driver unknown to the directory
    SeedTrip { id: "trip-0012", driver: "drv-09999", vehicle: "KA09XY0001", status: TripStatus::Completed, entry: Some((6, 30)), minutes: 40, samples: 5 },
    // Start not recorded yet
    SeedTrip { id: "trip-0013", driver: "drv-00003", vehicle: "KA03EF9012", status: TripStatus::Idle, entry: None, minutes: 0, samples: 0 },
];

/// Trips anchored to the UTC day containing `now`
pub fn seed_trips(now: OffsetDateTime) -> Vec<Trip> {
    let midnight = now.replace_time(Time::MIDNIGHT);

    SEED_TRIPS
        .iter()
        .enumerate()
        .map(|(i, seed)| {
            let mut trip = Trip::new(seed.id, seed.driver, seed.vehicle);
            trip.status = seed.status;
            trip.entry_time = seed.entry.map(|(h, m)| {
                let offset = Duration::hours(i64::from(h)) + Duration::minutes(i64::from(m));
                Timestamp(midnight + offset)
            });

            let start = (12.9716 + 0.01 * i as f64, 77.5946 - 0.008 * i as f64);
            let heading = if i % 2 == 0 { (0.0011, 0.0007) } else { (-0.0006, 0.0012) };
            trip.locations = trace(start, heading, seed.samples);
            trip.speed = speeds(seed.samples, 28.0 + 3.0 * i as f64);

            if let Some(entry) = trip.entry_time {
                match seed.status {
                    TripStatus::Completed => {
                        let end = Timestamp(entry.0 + Duration::minutes(seed.minutes));
                        trip.end_time = Some(end);
                        trip.trip_duration = Some((seed.minutes * 60) as f64);
                    }
                    TripStatus::Ongoing => {
                        trip.trip_duration = Some((now - entry.0).as_seconds_f64().max(0.0));
                    }
                    TripStatus::Idle => {}
                }
            }
            trip
        })
        .collect()
}
