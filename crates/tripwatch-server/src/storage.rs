use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use time::{OffsetDateTime, Time};
use tripwatch_protocol::*;

/// Earliest and latest hour a scheduled slot may start (UTC)
const SCHEDULE_HOURS: std::ops::RangeInclusive<u8> = 6..=20;

/// Planned trip length when a driver has no completed trips yet
const DEFAULT_TRIP_HOURS: f64 = 1.5;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Trip not found")]
    TripNotFound,

    #[error("Trip is already completed")]
    AlreadyCompleted,

    #[error("{0}")]
    Invalid(String),

    #[error("could not generate an id: {0}")]
    Entropy(#[from] getrandom::Error),
}

/// In-memory trips, drivers and the current optimized schedule
pub struct TripStore {
    trips: DashMap<TripId, Trip>,
    drivers: DashMap<DriverId, Driver>,
    schedule: RwLock<Vec<Vec<ScheduleEntry>>>,
}

impl TripStore {
    /// Create a store; with `simulate_every`, ongoing trips gain a GPS and
    /// speed sample on that period.
    pub fn new(simulate_every: Option<Duration>) -> Arc<Self> {
        let store = Arc::new(Self {
            trips: DashMap::new(),
            drivers: DashMap::new(),
            schedule: RwLock::new(Vec::new()),
        });

        if let Some(period) = simulate_every {
            let store_weak = Arc::downgrade(&store);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if let Some(store) = store_weak.upgrade() {
                        store.advance_ongoing();
                    } else {
                        break;
                    }
                }
            });
        }

        store
    }

    pub fn insert_trip(&self, trip: Trip) {
        self.trips.insert(trip.id.clone(), trip);
    }

    pub fn insert_driver(&self, driver: Driver) {
        self.drivers.insert(driver.driver_id.clone(), driver);
    }

    /// All trips, newest entry first; trips still being processed come last
    pub fn list_trips(&self) -> Vec<Trip> {
        let mut trips: Vec<Trip> = self.trips.iter().map(|entry| entry.value().clone()).collect();
        trips.sort_by(|a, b| match (a.entry_time, b.entry_time) {
            (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.id.cmp(&b.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });
        trips
    }

    pub fn get_trip(&self, id: &TripId) -> Option<Trip> {
        self.trips.get(id).map(|entry| entry.value().clone())
    }

    pub fn list_drivers(&self) -> Vec<Driver> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.driver_id.cmp(&b.driver_id)));
        drivers
    }

    /// Mark a trip completed now and return its end time
    pub fn end_trip(&self, id: &TripId) -> Result<Timestamp, StoreError> {
        let mut trip = self.trips.get_mut(id).ok_or(StoreError::TripNotFound)?;
        if trip.status == TripStatus::Completed {
            return Err(StoreError::AlreadyCompleted);
        }
        trip.mark_completed(Timestamp::now());
        let end = trip.end_time.unwrap_or_else(Timestamp::now);
        trip.trip_duration = elapsed_seconds(trip.entry_time, end);
        tracing::info!(trip_id = %id, "trip ended");
        Ok(end)
    }

    /// Validate and store a new driver with a fresh id and QR code
    pub fn register_driver(&self, request: RegisterDriver) -> Result<Driver, StoreError> {
        let required = [
            ("name", &request.name),
            ("vehicle_id", &request.vehicle_id),
            ("email", &request.email),
            ("phone", &request.phone),
            ("password", &request.password),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(StoreError::Invalid(format!("{field} is required")));
        }
        if !request.email.contains('@') {
            return Err(StoreError::Invalid("email is not valid".to_string()));
        }

        let driver_id = DriverId::new(random_id()?);
        let qr_code = format!("QR-{driver_id}");
        let driver = Driver {
            qr_code: Some(qr_code),
            email: Some(request.email.trim().to_string()),
            phone: Some(request.phone.trim().to_string()),
            vehicle_id: Some(request.vehicle_id.trim().to_string()),
            ..Driver::new(driver_id, request.name.trim())
        };
        self.insert_driver(driver.clone());
        tracing::info!(driver_id = %driver.driver_id, "driver registered");
        Ok(driver)
    }

    pub fn schedule(&self) -> Vec<Vec<ScheduleEntry>> {
        self.schedule.read().clone()
    }

    /// Rebuild the schedule: one slot per driver, each placed in the least
    /// congested hour given the trips already recorded.
    pub fn regenerate_schedule(&self) -> Vec<Vec<ScheduleEntry>> {
        let trips = self.list_trips();
        let mut load = [0u32; 24];
        for trip in &trips {
            if let Some(entry) = trip.entry_time {
                load[usize::from(entry.0.hour())] += 1;
            }
        }

        let today = OffsetDateTime::now_utc().date();
        let mut schedule = Vec::new();
        for driver in self.list_drivers() {
            let hour = SCHEDULE_HOURS
                .min_by_key(|h| (load[usize::from(*h)], *h))
                .unwrap_or(*SCHEDULE_HOURS.start());
            let slot = load[usize::from(hour)];
            load[usize::from(hour)] += 1;

            let own: Vec<&Trip> = trips
                .iter()
                .filter(|t| t.driver_id == driver.driver_id)
                .collect();
            let trip_hours = planned_hours(&own);
            let span = trip_hours.ceil().max(1.0) as usize;
            let congestion = (0..span)
                .map(|i| f64::from(load[(usize::from(hour) + i) % 24]))
                .collect();
            let mut speed: Vec<f64> = own.iter().flat_map(|t| t.speed.iter().copied()).collect();
            if speed.is_empty() {
                speed.push(40.0);
            }

            let minute = ((slot % 4) * 15) as u8;
            let entry_time = Time::from_hms(hour, minute, 0)
                .ok()
                .map(|t| Timestamp(today.with_time(t).assume_utc()));

            schedule.push(vec![ScheduleEntry {
                vehicle_id: driver.vehicle_id.clone(),
                entry_time,
                trip_time: Some(trip_hours),
                congestion,
                speed,
                driver_name: Some(driver.name.clone()),
            }]);
        }

        tracing::info!(slots = schedule.len(), "schedule regenerated");
        *self.schedule.write() = schedule.clone();
        schedule
    }

    /// Move every ongoing trip one sample forward
    pub fn advance_ongoing(&self) {
        let now = Timestamp::now();
        let mut advanced = 0usize;
        for mut entry in self.trips.iter_mut() {
            let trip = entry.value_mut();
            if trip.status != TripStatus::Ongoing {
                continue;
            }
            if let Some(last) = trip.last_location() {
                let next =
                    Coordinate::new(last.lat + 0.0004 * jitter(), last.lng + 0.0004 * jitter());
                trip.locations.push(next);
            }
            let base = trip.last_speed().unwrap_or(35.0);
            trip.speed.push((base + 5.0 * jitter()).clamp(5.0, 90.0));
            trip.trip_duration = elapsed_seconds(trip.entry_time, now);
            advanced += 1;
        }
        tracing::trace!(advanced, "advanced ongoing trips");
    }
}

fn elapsed_seconds(entry: Option<Timestamp>, end: Timestamp) -> Option<f64> {
    entry.map(|start| (end.0 - start.0).as_seconds_f64().max(0.0))
}

/// Mean length of a driver's completed trips, in hours to two decimals
fn planned_hours(trips: &[&Trip]) -> f64 {
    let durations: Vec<f64> = trips
        .iter()
        .filter(|t| t.status == TripStatus::Completed)
        .filter_map(|t| t.trip_duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .collect();
    if durations.is_empty() {
        return DEFAULT_TRIP_HOURS;
    }
    let mean = durations.iter().sum::<f64>() / durations.len() as f64 / 3600.0;
    (mean * 100.0).round() / 100.0
}

/// Random 16-byte id, hex encoded
pub fn random_id() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Uniform-ish value in [-1, 1); zero if the OS has no entropy for us
fn jitter() -> f64 {
    let mut bytes = [0u8; 2];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => f64::from(u16::from_le_bytes(bytes)) / 32_768.0 - 1.0,
        Err(_) => 0.0,
    }
}
