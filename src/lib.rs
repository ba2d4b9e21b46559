//! Heart-rate sensor ingestion relay.
//!
//! A device posts readings (infrared amplitude, instantaneous and averaged
//! heart rate) together with a shared secret; a dashboard polls for the most
//! recent one.
//!
//! ```text
//! device    --POST /sensor-data-->  ingest_reading  --insert-->  store
//! dashboard --GET  /sensor-data-->  latest_reading  --latest-->  store
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`auth`]: Shared-secret verification
//! - [`reading`]: Reading types and payload coercion
//! - [`store`]: Reading persistence (SQLite and in-memory)
//! - [`api`]: HTTP API
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reading;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, RelayError, Result, StoreError};
pub use reading::SensorReading;
