//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use super::handlers::{self, HealthResponse, ReadyResponse};
use crate::reading::{IngestRequest, SensorReading};

/// Generated OpenAPI description, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "pulse-relay", description = "Heart-rate sensor ingestion relay"),
    paths(
        handlers::ingest_reading,
        handlers::latest_reading,
        handlers::health,
        handlers::ready,
    ),
    components(schemas(SensorReading, IngestRequest, HealthResponse, ReadyResponse)),
    tags(
        (name = "sensor", description = "Reading ingestion and retrieval"),
        (name = "ops", description = "Liveness and readiness"),
    )
)]
pub struct ApiDoc;
