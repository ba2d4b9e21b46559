//! In-memory reading store for unit testing.
//!
//! Behaves like the SQLite store, minus durability. Failures can be switched
//! on to exercise the error paths of the HTTP layer.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ReadingStore;
use crate::error::StoreError;
use crate::reading::SensorReading;

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<SensorReading>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of readings held.
    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    /// Whether nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: SensorReading) -> Result<(), StoreError> {
        self.check()?;
        self.readings.write().await.push(reading);
        Ok(())
    }

    async fn latest(&self) -> Result<Option<SensorReading>, StoreError> {
        self.check()?;
        // max_by_key keeps the last of equal keys, i.e. the latest insert.
        Ok(self
            .readings
            .read()
            .await
            .iter()
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
