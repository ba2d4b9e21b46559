//! Durable storage for sensor readings.
//!
//! Handlers only ever see the [`ReadingStore`] trait through a [`StorePtr`],
//! so the backend is chosen once at startup and passed in explicitly.
//!
//! - [`SqliteStore`]: the production backend, a single SQLite file.
//! - [`MemoryStore`]: in-process backend for tests, with failure injection.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::StoreError;
use crate::reading::SensorReading;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Shared handle to a store backend.
pub type StorePtr = Arc<dyn ReadingStore>;

/// The operations the relay needs from persistence.
///
/// Readings are append-only: there is no update or delete.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist one reading.
    async fn insert(&self, reading: SensorReading) -> Result<(), StoreError>;

    /// The reading with the greatest `created_at`, if any.
    ///
    /// Equal timestamps resolve to the most recently inserted reading.
    async fn latest(&self) -> Result<Option<SensorReading>, StoreError>;

    /// Cheap round-trip used by the readiness check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release the backend. Later calls fail with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}

/// Open the SQLite store named by the configuration.
pub async fn open_configured(config: &Config) -> crate::Result<SqliteStore> {
    Ok(SqliteStore::open(&config.database_path).await?)
}
