//! HTTP API route definitions.

use std::path::Path;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::docs::ApiDoc;
use super::handlers::{health, ingest_reading, latest_reading, metrics_endpoint, ready, AppState};

/// Create the API router.
///
/// Paths the API does not claim fall through to `static_dir` when given.
pub fn create_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Device and dashboard endpoint
        .route("/sensor-data", get(latest_reading).post(ingest_reading));

    if state.metrics.is_some() {
        router = router.route("/metrics", get(metrics_endpoint));
    }

    router = router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cross-origin requests are allowed from anywhere.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
