//! HTTP API: sensor ingestion, latest reading, health and metrics.

pub mod docs;
pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
