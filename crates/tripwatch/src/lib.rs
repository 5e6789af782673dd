//! Client-side engine for the Tripwatch operator dashboard.
//!
//! Keeps a live, filtered view of vehicle trips in sync with the trip
//! service, buckets trips by hour and status for the traffic chart, and
//! turns GPS samples into drawable routes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tripwatch::{ChartSource, ClientConfig, HttpTripService, SyncConfig, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = HttpTripService::new(ClientConfig::new("http://127.0.0.1:5001"))?;
//!     let dashboard = SyncEngine::new(Arc::new(service), SyncConfig::default()).spawn();
//!
//!     dashboard.set_term("KA01");
//!
//!     let mut state = dashboard.subscribe();
//!     state.changed().await?;
//!     let chart = state.borrow().chart(ChartSource::Filtered);
//!     println!("{} trips charted", chart.total());
//!
//!     dashboard.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod api;
pub mod config;
pub mod detail;
pub mod filter;
pub mod route;
pub mod schedule;
pub mod state;
pub mod sync;
pub mod time_format;

pub use aggregate::{aggregate, HourBuckets, HourCount};
pub use api::{ApiError, HttpTripService, TripService};
pub use config::{ChartSource, ClientConfig, PollMode, SyncConfig};
pub use detail::{load_trip_detail, DriverCard, DriverDirectory, TripDetail, TripRow};
pub use filter::{matches, SearchField, TripQuery};
pub use route::{RouteBuilder, RouteError, RoutePlan, RouteSolver, SimplifyingSolver};
pub use schedule::{ScheduleBoard, ScheduleRow};
pub use state::{DashboardEvent, DashboardState, SyncPhase};
pub use sync::{DashboardHandle, Notice, SyncEngine};
pub use time_format::{ClockMode, DisplayDateTime, TimeFormatter};
pub use tripwatch_protocol::*;
