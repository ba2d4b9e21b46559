//! Prometheus metrics for ingestion and store latency.
//!
//! Everything recorded here is advisory; a missing recorder turns the
//! macros into no-ops.

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tracing::debug;

// === Metric Name Constants ===

/// Readings accepted and stored.
pub const METRIC_READINGS_INGESTED: &str = "readings_ingested_total";
/// Ingestion or retrieval requests that failed, labelled by reason.
pub const METRIC_READINGS_REJECTED: &str = "readings_rejected_total";
/// Latest-reading responses served.
pub const METRIC_READINGS_SERVED: &str = "readings_served_total";
/// Latest-reading requests that found the store empty.
pub const METRIC_LATEST_EMPTY: &str = "latest_reading_empty_total";
/// Store call latency, labelled by operation.
pub const METRIC_STORE_LATENCY: &str = "store_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_READINGS_INGESTED,
        "Total number of sensor readings stored"
    );
    describe_counter!(
        METRIC_READINGS_REJECTED,
        "Total number of sensor-data requests that failed"
    );
    describe_counter!(
        METRIC_READINGS_SERVED,
        "Total number of latest-reading responses served"
    );
    describe_counter!(
        METRIC_LATEST_EMPTY,
        "Total number of latest-reading requests answered with 404"
    );
    describe_histogram!(
        METRIC_STORE_LATENCY,
        "Reading store call latency in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return the handle that renders it.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// How often [`spawn_upkeep`] drains histogram buckets by default.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Periodically drain recorded samples so memory stays bounded between scrapes.
///
/// Abort the returned handle at shutdown.
pub fn spawn_upkeep(handle: PrometheusHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            handle.run_upkeep();
        }
    })
}

/// Increment readings ingested counter.
pub fn inc_readings_ingested() {
    counter!(METRIC_READINGS_INGESTED).increment(1);
}

/// Increment rejected counter for the given reason.
pub fn inc_readings_rejected(reason: &'static str) {
    counter!(METRIC_READINGS_REJECTED, "reason" => reason).increment(1);
}

/// Increment readings served counter.
pub fn inc_readings_served() {
    counter!(METRIC_READINGS_SERVED).increment(1);
}

/// Increment the empty-store counter.
pub fn inc_latest_empty() {
    counter!(METRIC_LATEST_EMPTY).increment(1);
}

/// RAII guard for timing store calls.
/// Records latency when dropped.
pub struct StoreTimer {
    start: Instant,
    op: &'static str,
}

impl StoreTimer {
    /// Start timing the named store operation.
    pub fn new(op: &'static str) -> Self {
        Self {
            start: Instant::now(),
            op,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for StoreTimer {
    fn drop(&mut self) {
        histogram!(METRIC_STORE_LATENCY, "op" => self.op).record(self.elapsed_ms());
    }
}

/// Create a timer for a store insert.
pub fn timer_store_insert() -> StoreTimer {
    StoreTimer::new("insert")
}

/// Create a timer for a latest-reading query.
pub fn timer_store_latest() -> StoreTimer {
    StoreTimer::new("latest")
}
