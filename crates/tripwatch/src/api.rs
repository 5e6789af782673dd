//! Access to the remote trip service.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tripwatch_protocol::{
    Driver, DriversEnvelope, EndTripReply, ErrorBody, RegisterDriver, RegisterDriverReply,
    ScheduleEntry, ScheduleEnvelope, Trip, TripId, TripsEnvelope,
};

use crate::config::ClientConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status of a non-2xx answer, if that's what this is
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Operations the dashboard needs from the trip service
#[async_trait]
pub trait TripService: Send + Sync {
    async fn list_trips(&self) -> Result<Vec<Trip>, ApiError>;

    async fn list_drivers(&self) -> Result<Vec<Driver>, ApiError>;

    async fn get_trip(&self, id: &TripId) -> Result<Trip, ApiError>;

    async fn end_trip(&self, id: &TripId) -> Result<EndTripReply, ApiError>;

    /// Latest optimized schedule, flattened
    async fn optimized_schedule(&self) -> Result<Vec<ScheduleEntry>, ApiError>;

    /// Ask the service to recompute the schedule
    async fn generate_schedule(&self) -> Result<(), ApiError>;

    async fn register_driver(
        &self,
        driver: &RegisterDriver,
    ) -> Result<RegisterDriverReply, ApiError>;
}

/// [`TripService`] over HTTP/JSON
#[derive(Clone, Debug)]
pub struct HttpTripService {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTripService {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tripwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&RegisterDriver>,
    ) -> Result<ResponseBody, ApiError> {
        let url = self.config.endpoint(path);
        tracing::debug!(%method, %url, "calling trip service");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|b| b.text().map(str::to_string))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string()
                });
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(ResponseBody {
            endpoint: url,
            bytes: bytes.to_vec(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None).await?.json()
    }
}

/// A successful response body, remembered with where it came from
struct ResponseBody {
    endpoint: String,
    bytes: Vec<u8>,
}

impl ResponseBody {
    fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.bytes).map_err(|source| ApiError::Decode {
            endpoint: self.endpoint,
            source,
        })
    }

    /// Decode, treating an empty body as the type's default
    fn json_or_default<T: DeserializeOwned + Default>(self) -> Result<T, ApiError> {
        if self.bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        self.json()
    }
}

#[async_trait]
impl TripService for HttpTripService {
    async fn list_trips(&self) -> Result<Vec<Trip>, ApiError> {
        let envelope: TripsEnvelope = self.get_json("/api/trips").await?;
        Ok(envelope.trips)
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, ApiError> {
        let envelope: DriversEnvelope = self.get_json("/get_drivers").await?;
        Ok(envelope.drivers)
    }

    async fn get_trip(&self, id: &TripId) -> Result<Trip, ApiError> {
        self.get_json(&format!("/api/trips/{id}")).await
    }

    async fn end_trip(&self, id: &TripId) -> Result<EndTripReply, ApiError> {
        self.send(Method::PUT, &format!("/end_trip/{id}"), None)
            .await?
            .json_or_default()
    }

    async fn optimized_schedule(&self) -> Result<Vec<ScheduleEntry>, ApiError> {
        let envelope: ScheduleEnvelope = self.get_json("/api/optimized_schedule").await?;
        Ok(envelope.into_entries())
    }

    async fn generate_schedule(&self) -> Result<(), ApiError> {
        self.send(Method::GET, "/api/schedule", None).await?;
        Ok(())
    }

    async fn register_driver(
        &self,
        driver: &RegisterDriver,
    ) -> Result<RegisterDriverReply, ApiError> {
        self.send(Method::POST, "/register_driver", Some(driver))
            .await?
            .json()
    }
}
