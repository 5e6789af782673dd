//! The dashboard's state container.
//!
//! Every change goes through [`DashboardState::apply`], which consumes the
//! old state and returns the new one. The sync engine is the only caller;
//! everyone else reads snapshots.

use time::Date;
use tripwatch_protocol::{Driver, Timestamp, Trip, TripId};

use crate::aggregate::{aggregate, HourBuckets};
use crate::config::ChartSource;
use crate::detail::{DriverDirectory, TripRow};
use crate::filter::TripQuery;
use crate::time_format::TimeFormatter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    /// At least one fetch is outstanding
    Fetching,
    /// Torn down; no further changes
    Stopped,
}

/// Something that happened to the dashboard
#[derive(Clone, Debug)]
pub enum DashboardEvent {
    FetchStarted { seq: u64 },
    SnapshotLoaded { seq: u64, trips: Vec<Trip> },
    SnapshotFailed { seq: u64, error: String },
    DriversLoaded { seq: u64, drivers: Vec<Driver> },
    DriversFailed { seq: u64, error: String },
    FetchSettled,
    QueryChanged(TripQuery),
    TripEnded { id: TripId, at: Timestamp },
    /// Ignore snapshots from fetches started before `seq`
    ReconcileFrom { seq: u64 },
    Stopped,
}

#[derive(Clone, Debug)]
pub struct DashboardState {
    trips: Vec<Trip>,
    filtered: Vec<Trip>,
    drivers: DriverDirectory,
    query: TripQuery,
    fmt: TimeFormatter,
    loading: bool,
    last_error: Option<String>,
    phase: SyncPhase,
    in_flight: usize,
    /// Sequence number of the snapshot currently held (0 = none yet)
    applied_seq: u64,
    /// Sequence number of the fetch that produced `drivers`
    drivers_seq: u64,
    reconcile_floor: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(TimeFormatter::default(), TripQuery::default())
    }
}

impl DashboardState {
    pub fn new(fmt: TimeFormatter, query: TripQuery) -> Self {
        Self {
            trips: Vec::new(),
            filtered: Vec::new(),
            drivers: DriverDirectory::default(),
            query,
            fmt,
            loading: true,
            last_error: None,
            phase: SyncPhase::Idle,
            in_flight: 0,
            applied_seq: 0,
            drivers_seq: 0,
            reconcile_floor: 0,
        }
    }

    pub fn apply(mut self, event: DashboardEvent) -> Self {
        if self.phase == SyncPhase::Stopped {
            tracing::trace!(?event, "dashboard stopped, ignoring event");
            return self;
        }

        match event {
            DashboardEvent::FetchStarted { seq } => {
                tracing::trace!(seq, "fetch started");
                self.in_flight += 1;
                self.phase = SyncPhase::Fetching;
            }
            DashboardEvent::SnapshotLoaded { seq, trips } => {
                self.loading = false;
                if seq <= self.applied_seq || seq < self.reconcile_floor {
                    tracing::debug!(
                        seq,
                        applied = self.applied_seq,
                        floor = self.reconcile_floor,
                        "discarding stale snapshot"
                    );
                    return self;
                }
                self.trips = trips;
                self.applied_seq = seq;
                self.last_error = None;
                self.refilter();
            }
            DashboardEvent::SnapshotFailed { seq, error } => {
                self.loading = false;
                if seq > self.applied_seq {
                    self.last_error = Some(error);
                }
            }
            DashboardEvent::DriversLoaded { seq, drivers } => {
                if seq <= self.drivers_seq {
                    tracing::debug!(seq, applied = self.drivers_seq, "discarding stale drivers");
                    return self;
                }
                self.drivers = DriverDirectory::from_drivers(drivers);
                self.drivers_seq = seq;
            }
            DashboardEvent::DriversFailed { seq, error } => {
                if seq > self.drivers_seq {
                    self.last_error = Some(error);
                }
            }
            DashboardEvent::FetchSettled => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if self.in_flight == 0 {
                    self.phase = SyncPhase::Idle;
                }
            }
            DashboardEvent::QueryChanged(query) => {
                self.query = query;
                self.refilter();
            }
            DashboardEvent::TripEnded { id, at } => {
                if let Some(trip) = self.trips.iter_mut().find(|t| t.id == id) {
                    trip.mark_completed(at);
                }
                self.refilter();
            }
            DashboardEvent::ReconcileFrom { seq } => {
                self.reconcile_floor = self.reconcile_floor.max(seq);
            }
            DashboardEvent::Stopped => {
                self.phase = SyncPhase::Stopped;
                self.in_flight = 0;
            }
        }
        self
    }

    fn refilter(&mut self) {
        self.filtered = self.query.select(&self.trips, &self.fmt);
    }

    /// Every trip in the latest snapshot
    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    /// Trips passing the active query
    pub fn filtered(&self) -> &[Trip] {
        &self.filtered
    }

    pub fn trip(&self, id: &TripId) -> Option<&Trip> {
        self.trips.iter().find(|t| &t.id == id)
    }

    pub fn drivers(&self) -> &DriverDirectory {
        &self.drivers
    }

    pub fn query(&self) -> &TripQuery {
        &self.query
    }

    pub fn term(&self) -> &str {
        &self.query.term
    }

    pub fn date(&self) -> Option<Date> {
        self.query.date
    }

    pub fn formatter(&self) -> &TimeFormatter {
        &self.fmt
    }

    /// True until the first trip fetch has either succeeded or failed
    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn chart(&self, source: ChartSource) -> HourBuckets {
        match source {
            ChartSource::Filtered => aggregate(&self.filtered, &self.fmt),
            ChartSource::All => aggregate(&self.trips, &self.fmt),
        }
    }

    pub fn rows(&self) -> Vec<TripRow> {
        self.filtered
            .iter()
            .map(|t| TripRow::project(t, &self.drivers, &self.fmt))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use tripwatch_protocol::TripStatus;

    fn trip(id: &str, vehicle: &str, status: TripStatus) -> Trip {
        let mut t = Trip::new(id, "d1", vehicle);
        t.status = status;
        t.entry_time = Some(Timestamp(datetime!(2024-10-19 09:15:00 UTC)));
        t
    }

    fn fleet() -> Vec<Trip> {
        vec![
            trip("a", "KA01AB1234", TripStatus::Ongoing),
            trip("b", "KA02CD5678", TripStatus::Ongoing),
            trip("c", "KA01ZZ0001", TripStatus::Idle),
        ]
    }

    fn state() -> DashboardState {
        DashboardState::new(TimeFormatter::utc(), TripQuery::default())
    }

    #[test]
    fn filtered_tracks_snapshot_and_query() {
        let s = state()
            .apply(DashboardEvent::QueryChanged(TripQuery::term("ka01")))
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() });
        let ids: Vec<_> = s.filtered().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);

        let s = s.apply(DashboardEvent::QueryChanged(TripQuery::term("")));
        assert_eq!(s.filtered().len(), 3);
        assert_eq!(s.trips().len(), 3);
    }

    #[test]
    fn loading_clears_on_first_outcome_only() {
        let s = state();
        assert!(s.loading());
        let s = s.apply(DashboardEvent::SnapshotFailed {
            seq: 1,
            error: "boom".into(),
        });
        assert!(!s.loading());
        assert_eq!(s.last_error(), Some("boom"));
        assert!(s.trips().is_empty());
    }

    #[test]
    fn failure_keeps_previous_snapshot() {
        let s = state()
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() })
            .apply(DashboardEvent::SnapshotFailed {
                seq: 2,
                error: "timeout".into(),
            });
        assert_eq!(s.trips().len(), 3);
        assert_eq!(s.last_error(), Some("timeout"));

        let s = s.apply(DashboardEvent::SnapshotLoaded { seq: 3, trips: fleet() });
        assert_eq!(s.last_error(), None);
    }

    #[test]
    fn older_snapshot_loses_to_newer() {
        let s = state()
            .apply(DashboardEvent::SnapshotLoaded {
                seq: 2,
                trips: vec![trip("new", "X", TripStatus::Idle)],
            })
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() });
        assert_eq!(s.trips().len(), 1);
        assert_eq!(s.trips()[0].id.as_str(), "new");
    }

    #[test]
    fn trip_ended_updates_raw_and_filtered() {
        let query = TripQuery::term("ongoing").with_field(crate::filter::SearchField::Status);
        let s = state()
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() })
            .apply(DashboardEvent::QueryChanged(TripQuery::term("KA01AB")))
            .apply(DashboardEvent::TripEnded {
                id: "a".into(),
                at: Timestamp(datetime!(2024-10-19 10:00:00 UTC)),
            });
        assert_eq!(s.filtered()[0].status, TripStatus::Completed);
        assert_eq!(s.trip(&"a".into()).map(|t| t.status), Some(TripStatus::Completed));
        assert!(s.trip(&"a".into()).and_then(|t| t.end_time).is_some());

        // A status query drops the ended trip from view
        let s = s.apply(DashboardEvent::QueryChanged(query));
        let ids: Vec<_> = s.filtered().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b"]);
    }

    #[test]
    fn reconcile_floor_discards_earlier_fetches() {
        let s = state()
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() })
            .apply(DashboardEvent::ReconcileFrom { seq: 5 })
            .apply(DashboardEvent::SnapshotLoaded { seq: 4, trips: Vec::new() });
        assert_eq!(s.trips().len(), 3);

        let s = s.apply(DashboardEvent::SnapshotLoaded { seq: 5, trips: Vec::new() });
        assert!(s.trips().is_empty());
    }

    #[test]
    fn phase_follows_outstanding_fetches() {
        let s = state()
            .apply(DashboardEvent::FetchStarted { seq: 1 })
            .apply(DashboardEvent::FetchStarted { seq: 2 });
        assert_eq!(s.phase(), SyncPhase::Fetching);
        let s = s.apply(DashboardEvent::FetchSettled);
        assert_eq!(s.phase(), SyncPhase::Fetching);
        let s = s.apply(DashboardEvent::FetchSettled);
        assert_eq!(s.phase(), SyncPhase::Idle);
    }

    #[test]
    fn nothing_changes_after_stop() {
        let s = state()
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() })
            .apply(DashboardEvent::Stopped)
            .apply(DashboardEvent::SnapshotLoaded { seq: 2, trips: Vec::new() })
            .apply(DashboardEvent::QueryChanged(TripQuery::term("zzz")));
        assert_eq!(s.phase(), SyncPhase::Stopped);
        assert_eq!(s.trips().len(), 3);
        assert_eq!(s.filtered().len(), 3);
    }

    #[test]
    fn chart_and_rows_are_projections() {
        let s = state()
            .apply(DashboardEvent::DriversLoaded {
                seq: 1,
                drivers: vec![Driver::new("d1", "Asha")],
            })
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() })
            .apply(DashboardEvent::QueryChanged(TripQuery::term("KA02")));

        assert_eq!(s.chart(ChartSource::Filtered).total(), 1);
        assert_eq!(s.chart(ChartSource::All).total(), 3);
        assert_eq!(s.chart(ChartSource::All).ongoing[9].count, 2);

        let rows = s.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].driver_name, "Asha");
    }

    #[test]
    fn older_driver_list_loses_to_newer() {
        let s = state()
            .apply(DashboardEvent::DriversLoaded {
                seq: 3,
                drivers: vec![Driver::new("d1", "Asha")],
            })
            .apply(DashboardEvent::DriversLoaded {
                seq: 2,
                drivers: vec![Driver::new("d1", "Stale")],
            })
            .apply(DashboardEvent::DriversFailed {
                seq: 1,
                error: "late failure".into(),
            });
        assert_eq!(s.drivers().name_of("d1"), "Asha");
        assert_eq!(s.last_error(), None);
    }

    #[test]
    fn driver_failure_survives_a_good_snapshot_from_the_same_fetch() {
        let s = state()
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips: fleet() })
            .apply(DashboardEvent::DriversFailed {
                seq: 1,
                error: "drivers unavailable".into(),
            });
        assert_eq!(s.trips().len(), 3);
        assert_eq!(s.last_error(), Some("drivers unavailable"));
    }
}
