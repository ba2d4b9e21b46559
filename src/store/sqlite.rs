//! SQLite-backed reading store.
//!
//! One connection guarded by a mutex. Every query runs on tokio's blocking
//! pool so the async workers never wait on disk.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::ReadingStore;
use crate::error::StoreError;
use crate::reading::SensorReading;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sensor_readings (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        ir_value    REAL,
        bpm         REAL,
        avg_bpm     REAL,
        created_at  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sensor_readings_created_at
        ON sensor_readings (created_at DESC, id DESC);
";

/// Reading store persisted in a single SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
    path: Arc<str>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// `:memory:` gives a private in-memory database.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let owned = path.to_string();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&owned)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await??;

        info!("Opened reading store at {}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: Arc::from(path),
        })
    }

    /// Database location this store was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = match conn.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.as_ref() {
                Some(conn) => f(conn),
                None => Err(StoreError::Closed),
            }
        })
        .await?
    }
}

fn row_to_reading(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, SensorRow)> {
    Ok((
        row.get(0)?,
        SensorRow {
            ir_value: row.get(1)?,
            bpm: row.get(2)?,
            avg_bpm: row.get(3)?,
            created_at: row.get(4)?,
        },
    ))
}

struct SensorRow {
    ir_value: Option<f64>,
    bpm: Option<f64>,
    avg_bpm: Option<f64>,
    created_at: i64,
}

impl SensorRow {
    fn into_reading(self, id: i64) -> Result<SensorReading, StoreError> {
        let created_at =
            DateTime::from_timestamp_micros(self.created_at).ok_or_else(|| StoreError::Corrupt {
                id,
                reason: format!("timestamp {} out of range", self.created_at),
            })?;
        Ok(SensorReading {
            ir_value: self.ir_value,
            bpm: self.bpm,
            avg_bpm: self.avg_bpm,
            created_at,
        })
    }
}

#[async_trait]
impl ReadingStore for SqliteStore {
    async fn insert(&self, reading: SensorReading) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sensor_readings (ir_value, bpm, avg_bpm, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    reading.ir_value,
                    reading.bpm,
                    reading.avg_bpm,
                    reading.created_at.timestamp_micros(),
                ],
            )?;
            debug!("Inserted reading row {}", conn.last_insert_rowid());
            Ok(())
        })
        .await
    }

    async fn latest(&self) -> Result<Option<SensorReading>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, ir_value, bpm, avg_bpm, created_at
                     FROM sensor_readings
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1",
                    [],
                    row_to_reading,
                )
                .optional()?;
            row.map(|(id, row)| row.into_reading(id)).transpose()
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let mut guard = match conn.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
                info!("Closed reading store at {}", path);
            }
            Ok(())
        })
        .await?
    }
}
