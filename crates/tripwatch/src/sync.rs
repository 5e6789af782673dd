//! Periodic synchronization with the trip service.
//!
//! [`SyncEngine::spawn`] starts one task that owns the [`DashboardState`]
//! and is its only writer. Fetches run in their own tasks and report back
//! over a channel, so a slow service never delays the next tick. Readers
//! watch the state through a `watch` channel and one-shot messages
//! ([`Notice`]) through a `broadcast` channel.

use std::sync::Arc;
use std::time::Duration;
use time::Date;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tripwatch_protocol::{Driver, EndTripReply, Timestamp, Trip, TripId};

use crate::api::{ApiError, TripService};
use crate::config::{PollMode, SyncConfig};
use crate::filter::TripQuery;
use crate::state::{DashboardEvent, DashboardState};
use crate::time_format::TimeFormatter;

/// Shortest tick the engine accepts
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One-shot message for the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    RefreshFailed { message: String },
    TripEnded { id: TripId },
    EndTripFailed { id: TripId, message: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::RefreshFailed { message } => write!(f, "Refresh failed: {message}"),
            Notice::TripEnded { id } => write!(f, "Trip {id} ended"),
            Notice::EndTripFailed { id, message } => {
                write!(f, "Could not end trip {id}: {message}")
            }
        }
    }
}

#[derive(Debug)]
enum Command {
    SetTerm(String),
    SetDate(Option<Date>),
    SetQuery(TripQuery),
    Refresh,
    EndTrip(TripId),
}

enum Outcome {
    Fetched {
        seq: u64,
        trips: Result<Vec<Trip>, ApiError>,
        drivers: Result<Vec<Driver>, ApiError>,
    },
    EndTrip {
        id: TripId,
        result: Result<EndTripReply, ApiError>,
    },
}

pub struct SyncEngine {
    service: Arc<dyn TripService>,
    config: SyncConfig,
    fmt: TimeFormatter,
}

impl SyncEngine {
    /// Dates and hours are computed in UTC unless [`Self::with_formatter`]
    /// supplies the observer's offset.
    pub fn new(service: Arc<dyn TripService>, config: SyncConfig) -> Self {
        Self {
            service,
            config,
            fmt: TimeFormatter::utc(),
        }
    }

    /// Override the observer offset used for filtering and projections
    pub fn with_formatter(mut self, fmt: TimeFormatter) -> Self {
        self.fmt = fmt;
        self
    }

    /// Start the engine on the current tokio runtime.
    ///
    /// The first fetch is issued immediately.
    pub fn spawn(self) -> DashboardHandle {
        let query = TripQuery::default().with_field(self.config.field);
        let (state_tx, state_rx) = watch::channel(DashboardState::new(self.fmt, query));
        let (notice_tx, _) = broadcast::channel(64);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let actor = Actor {
            service: self.service,
            config: self.config,
            state_tx,
            notice_tx: notice_tx.clone(),
            outcome_tx,
            cancel: cancel.clone(),
            next_seq: 0,
        };
        let task = tokio::spawn(actor.run(command_rx, outcome_rx));

        DashboardHandle {
            commands: command_tx,
            state: state_rx,
            notices: notice_tx,
            cancel: cancel.clone(),
            task,
            _guard: cancel.drop_guard(),
        }
    }
}

struct Actor {
    service: Arc<dyn TripService>,
    config: SyncConfig,
    state_tx: watch::Sender<DashboardState>,
    notice_tx: broadcast::Sender<Notice>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    cancel: CancellationToken,
    next_seq: u64,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<Outcome>,
    ) {
        let period = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let polling = self.config.mode == PollMode::Continuous;

        tracing::debug!(?period, mode = ?self.config.mode, "sync engine started");
        self.start_fetch();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(outcome) = outcomes.recv() => self.on_outcome(outcome),

                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },

                _ = ticker.tick(), if polling => {
                    self.start_fetch();
                }
            }
        }

        self.apply(DashboardEvent::Stopped);
        tracing::debug!("sync engine stopped");
    }

    fn apply(&self, event: DashboardEvent) {
        self.state_tx.send_modify(|state| {
            let current = std::mem::take(state);
            *state = current.apply(event);
        });
    }

    fn notify(&self, notice: Notice) {
        // Nobody listening is fine
        let _ = self.notice_tx.send(notice);
    }

    /// Spawn a fetch of trips and drivers; returns its sequence number
    fn start_fetch(&mut self) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.apply(DashboardEvent::FetchStarted { seq });

        let service = self.service.clone();
        let outcome_tx = self.outcome_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let fetch = async { tokio::join!(service.list_trips(), service.list_drivers()) };
            let (trips, drivers) = tokio::select! {
                _ = cancel.cancelled() => return,
                results = fetch => results,
            };
            if cancel.is_cancelled() {
                return;
            }
            let _ = outcome_tx.send(Outcome::Fetched { seq, trips, drivers });
        });

        seq
    }

    fn on_command(&mut self, command: Command) {
        tracing::trace!(?command, "dashboard command");
        match command {
            Command::SetTerm(term) => {
                let mut query = self.state_tx.borrow().query().clone();
                query.term = term;
                self.apply(DashboardEvent::QueryChanged(query));
            }
            Command::SetDate(date) => {
                let query = self.state_tx.borrow().query().clone().with_date(date);
                self.apply(DashboardEvent::QueryChanged(query));
            }
            Command::SetQuery(query) => self.apply(DashboardEvent::QueryChanged(query)),
            Command::Refresh => {
                self.start_fetch();
            }
            Command::EndTrip(id) => self.start_end_trip(id),
        }
    }

    fn start_end_trip(&self, id: TripId) {
        let service = self.service.clone();
        let outcome_tx = self.outcome_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = service.end_trip(&id) => result,
            };
            if cancel.is_cancelled() {
                return;
            }
            let _ = outcome_tx.send(Outcome::EndTrip { id, result });
        });
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Fetched { seq, trips, drivers } => {
                // Trips first: a good snapshot clears the error a driver failure sets
                match trips {
                    Ok(trips) => {
                        tracing::debug!(seq, count = trips.len(), "trip snapshot received");
                        self.apply(DashboardEvent::SnapshotLoaded { seq, trips });
                    }
                    Err(e) => {
                        tracing::warn!(seq, error = %e, "trip refresh failed");
                        let message = e.to_string();
                        self.apply(DashboardEvent::SnapshotFailed {
                            seq,
                            error: message.clone(),
                        });
                        self.notify(Notice::RefreshFailed { message });
                    }
                }
                match drivers {
                    Ok(drivers) => self.apply(DashboardEvent::DriversLoaded { seq, drivers }),
                    Err(e) => {
                        tracing::warn!(seq, error = %e, "driver refresh failed");
                        self.apply(DashboardEvent::DriversFailed {
                            seq,
                            error: e.to_string(),
                        });
                    }
                }
                self.apply(DashboardEvent::FetchSettled);
            }
            Outcome::EndTrip { id, result } => match result {
                Ok(reply) => {
                    tracing::info!(trip_id = %id, "trip ended");
                    let at = reply.end_time.unwrap_or_else(Timestamp::now);
                    self.apply(DashboardEvent::TripEnded { id: id.clone(), at });
                    self.notify(Notice::TripEnded { id });
                    let seq = self.start_fetch();
                    self.apply(DashboardEvent::ReconcileFrom { seq });
                }
                Err(e) => {
                    tracing::warn!(trip_id = %id, error = %e, "ending trip failed");
                    self.notify(Notice::EndTripFailed {
                        id,
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}

/// Control surface for a running [`SyncEngine`].
///
/// Dropping the handle tears the engine down.
pub struct DashboardHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<DashboardState>,
    notices: broadcast::Sender<Notice>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl DashboardHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("sync engine is gone, dropping command");
        }
    }

    /// Replace the search term; the date and field are kept
    pub fn set_term(&self, term: impl Into<String>) {
        self.send(Command::SetTerm(term.into()));
    }

    pub fn set_date(&self, date: Option<Date>) {
        self.send(Command::SetDate(date));
    }

    pub fn set_query(&self, query: TripQuery) {
        self.send(Command::SetQuery(query));
    }

    /// Fetch now, outside the regular schedule
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub fn end_trip(&self, id: impl Into<TripId>) {
        self.send(Command::EndTrip(id.into()));
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Stop the engine and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "sync engine task ended abnormally");
        }
    }
}
