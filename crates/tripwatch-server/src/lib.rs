mod seed_data;
mod storage;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tripwatch_protocol::*;

pub use crate::seed_data::{load_seed_data, seed_drivers, seed_trips};
pub use crate::storage::{random_id, StoreError, TripStore};

/// How often ongoing trips move when the server runs standalone
const SIMULATION_PERIOD: Duration = Duration::from_secs(5);

pub async fn run_server(host: impl Into<String>, port: u16, seed: bool) -> anyhow::Result<()> {
    let host = host.into();
    tracing::info!("🚗 Tripwatch dev server starting");

    let store = TripStore::new(Some(SIMULATION_PERIOD));
    if seed {
        load_seed_data(&store);
    }

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Listening on http://{}", addr);

    serve(listener, store).await
}

/// Serve the API on an already-bound listener
pub async fn serve(listener: TcpListener, store: Arc<TripStore>) -> anyhow::Result<()> {
    axum::serve(listener, router(store)).await?;
    Ok(())
}

pub fn router(store: Arc<TripStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/trips", get(list_trips))
        .route("/api/trips/:id", get(get_trip))
        .route("/end_trip/:id", put(end_trip))
        .route("/get_drivers", get(list_drivers))
        .route("/register_driver", post(register_driver))
        .route("/api/optimized_schedule", get(optimized_schedule))
        .route("/api/schedule", get(generate_schedule))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// JSON error response: `{"error": ...}` or `{"message": ...}`
struct ApiFailure {
    status: StatusCode,
    body: ErrorBody,
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StoreError> for ApiFailure {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::TripNotFound => StatusCode::NOT_FOUND,
            StoreError::AlreadyCompleted | StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
            StoreError::Entropy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match &err {
            StoreError::Invalid(text) => ErrorBody::message(text.clone()),
            other => ErrorBody::error(other.to_string()),
        };
        Self { status, body }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn list_trips(State(store): State<Arc<TripStore>>) -> Json<TripsEnvelope> {
    Json(TripsEnvelope {
        trips: store.list_trips(),
    })
}

async fn get_trip(
    State(store): State<Arc<TripStore>>,
    Path(id): Path<String>,
) -> Result<Json<Trip>, ApiFailure> {
    store
        .get_trip(&TripId::new(id))
        .map(Json)
        .ok_or_else(|| StoreError::TripNotFound.into())
}

async fn end_trip(
    State(store): State<Arc<TripStore>>,
    Path(id): Path<String>,
) -> Result<Json<EndTripReply>, ApiFailure> {
    let end_time = store.end_trip(&TripId::new(id))?;
    Ok(Json(EndTripReply {
        message: Some("Trip ended".to_string()),
        end_time: Some(end_time),
    }))
}

async fn list_drivers(State(store): State<Arc<TripStore>>) -> Json<DriversEnvelope> {
    Json(DriversEnvelope {
        drivers: store.list_drivers(),
    })
}

async fn register_driver(
    State(store): State<Arc<TripStore>>,
    body: Result<Json<RegisterDriver>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterDriverReply>), ApiFailure> {
    let Json(request) = body.map_err(|rejection| ApiFailure {
        status: StatusCode::BAD_REQUEST,
        body: ErrorBody::message(rejection.body_text()),
    })?;
    let driver = store.register_driver(request)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterDriverReply {
            message: "Driver registered successfully!".to_string(),
            driver_id: Some(driver.driver_id),
            qr_code: driver.qr_code,
        }),
    ))
}

async fn optimized_schedule(State(store): State<Arc<TripStore>>) -> Json<ScheduleEnvelope> {
    Json(ScheduleEnvelope {
        optimized_schedule: OptimizedSchedule::Nested(store.schedule()),
    })
}

async fn generate_schedule(State(store): State<Arc<TripStore>>) -> Json<serde_json::Value> {
    let schedule = store.regenerate_schedule();
    Json(serde_json::json!({ "schedule": OptimizedSchedule::Nested(schedule) }))
}
