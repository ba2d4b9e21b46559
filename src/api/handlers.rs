//! HTTP API handlers.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::auth::ApiKey;
use crate::error::ApiError;
use crate::metrics;
use crate::reading::{IngestRequest, SensorReading};
use crate::store::StorePtr;

/// Confirmation sent back to the device after a reading is stored.
pub const INGEST_OK: &str = "Data received successfully";

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Reading store backend.
    pub store: StorePtr,
    /// Shared secret devices must present.
    pub api_key: ApiKey,
    /// Reject missing, negative or non-finite values.
    pub strict_readings: bool,
    /// Prometheus renderer, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state around a store and key.
    pub fn new(store: StorePtr, api_key: ApiKey) -> Self {
        Self {
            store,
            api_key,
            strict_readings: false,
            metrics: None,
        }
    }

    /// Enable or disable strict reading validation.
    pub fn with_strict_readings(mut self, strict: bool) -> Self {
        self.strict_readings = strict;
        self
    }

    /// Attach a Prometheus handle so `/metrics` is served.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status: "ok".
    #[schema(value_type = String)]
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the store answered.
    pub ready: bool,
}

/// Store a reading sent by the device.
#[utoipa::path(
    post,
    path = "/sensor-data",
    tag = "sensor",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Reading stored", body = String),
        (status = 400, description = "Malformed body or non-numeric value", body = String),
        (status = 403, description = "API key mismatch", body = String),
        (status = 500, description = "Store failure", body = String),
    )
)]
pub async fn ingest_reading(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    match ingest(&state, &body).await {
        Ok(()) => {
            metrics::inc_readings_ingested();
            Ok(INGEST_OK)
        }
        Err(e) => {
            metrics::inc_readings_rejected(e.reason());
            Err(e)
        }
    }
}

async fn ingest(state: &AppState, body: &[u8]) -> Result<(), ApiError> {
    let request = IngestRequest::from_body(body).inspect_err(|e| {
        warn!("Rejected sensor payload: {}", e);
    })?;

    if !state.api_key.verify(request.api_key()) {
        warn!("Rejected sensor payload: invalid API key");
        return Err(ApiError::Unauthorized);
    }

    let values = request.values(state.strict_readings).inspect_err(|e| {
        warn!("Rejected sensor payload: {}", e);
    })?;

    info!(
        ir_value = ?values.ir_value,
        bpm = ?values.bpm,
        avg_bpm = ?values.avg_bpm,
        "Received sensor reading"
    );

    let reading = SensorReading::now(values);
    let _timer = metrics::timer_store_insert();
    state.store.insert(reading).await.map_err(|e| {
        error!("Failed to store reading: {}", e);
        ApiError::Internal("Error saving data")
    })
}

/// Return the most recently stored reading.
#[utoipa::path(
    get,
    path = "/sensor-data",
    tag = "sensor",
    responses(
        (status = 200, description = "Latest reading", body = SensorReading),
        (status = 404, description = "Nothing stored yet", body = String),
        (status = 500, description = "Store failure", body = String),
    )
)]
pub async fn latest_reading(
    State(state): State<AppState>,
) -> Result<Json<SensorReading>, ApiError> {
    let latest = {
        let _timer = metrics::timer_store_latest();
        state.store.latest().await
    };

    match latest {
        Ok(Some(reading)) => {
            metrics::inc_readings_served();
            Ok(Json(reading))
        }
        Ok(None) => {
            metrics::inc_latest_empty();
            Err(ApiError::NotFound)
        }
        Err(e) => {
            error!("Failed to load latest reading: {}", e);
            let err = ApiError::Internal("Error retrieving data");
            metrics::inc_readings_rejected(err.reason());
            Err(err)
        }
    }
}

/// Health check handler - always returns 200.
#[utoipa::path(
    get,
    path = "/health",
    tag = "ops",
    responses((status = 200, description = "Process is up", body = HealthResponse))
)]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if the store answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "ops",
    responses(
        (status = 200, description = "Store reachable", body = ReadyResponse),
        (status = 503, description = "Store unreachable", body = ReadyResponse),
    )
)]
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(ReadyResponse { ready: true })),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse { ready: false }),
            )
        }
    }
}

/// Prometheus exposition.
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
