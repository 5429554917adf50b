//! Ingestion Pipeline main entry

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use contracts::{DriverError, SourceDriver, SourceId, SourceSnapshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::config::{IngestionMetrics, LoopConfig, MetricsSnapshot};
use crate::error::{IngestionError, Result};
use crate::store::SnapshotStore;

/// Ingestion Pipeline
///
/// Owns one driver per source and runs one loop task per driver. Every loop
/// publishes into the shared [`SnapshotStore`].
pub struct IngestionPipeline {
    /// Drivers waiting for `start_all`
    drivers: HashMap<SourceId, Box<dyn SourceDriver>>,

    /// Per-source counters, kept after start
    metrics: HashMap<SourceId, Arc<IngestionMetrics>>,

    store: Arc<SnapshotStore>,

    config: LoopConfig,

    tasks: TaskTracker,

    started: bool,
}

impl IngestionPipeline {
    /// Create a pipeline publishing into `store`
    pub fn new(store: Arc<SnapshotStore>, config: LoopConfig) -> Self {
        Self {
            drivers: HashMap::new(),
            metrics: HashMap::new(),
            store,
            config,
            tasks: TaskTracker::new(),
            started: false,
        }
    }

    /// Register the driver for `driver.identity()`
    ///
    /// # Errors
    /// `DuplicateSource` if that source already has a driver,
    /// `AlreadyStarted` after `start_all`.
    #[instrument(
        name = "ingestion_register_driver",
        skip(self, driver),
        fields(source = %driver.identity())
    )]
    pub fn register_driver(&mut self, driver: Box<dyn SourceDriver>) -> Result<()> {
        if self.started {
            return Err(IngestionError::AlreadyStarted);
        }
        let source = driver.identity();
        if self.metrics.contains_key(&source) {
            return Err(IngestionError::DuplicateSource { source_id: source });
        }
        self.metrics.insert(source, Arc::new(IngestionMetrics::new()));
        self.drivers.insert(source, driver);
        debug!("registered driver");
        Ok(())
    }

    /// Spawn one loop per registered driver
    ///
    /// Loops run until `token` is cancelled.
    #[instrument(name = "ingestion_start_all", skip(self, token))]
    pub fn start_all(&mut self, token: CancellationToken) -> Result<()> {
        if self.started {
            return Err(IngestionError::AlreadyStarted);
        }
        self.started = true;

        info!(count = self.drivers.len(), "starting source loops");
        for (source, driver) in self.drivers.drain() {
            let source_loop = SourceLoop {
                source,
                store: Arc::clone(&self.store),
                metrics: Arc::clone(&self.metrics[&source]),
                config: self.config.clone(),
                token: token.clone(),
            };
            self.tasks.spawn(source_loop.run(driver));
        }
        self.tasks.close();
        Ok(())
    }

    /// Wait for every loop to exit (after cancellation)
    ///
    /// Returns immediately if the pipeline was never started.
    pub async fn join(&self) {
        if !self.started {
            return;
        }
        self.tasks.wait().await;
    }

    /// Counters of one source, `None` if it has no driver
    pub fn metrics(&self, source: SourceId) -> Option<MetricsSnapshot> {
        self.metrics.get(&source).map(|m| m.snapshot(source))
    }

    /// Counters of every registered source, in wire order
    pub fn all_metrics(&self) -> Vec<MetricsSnapshot> {
        SourceId::ALL
            .into_iter()
            .filter_map(|id| self.metrics(id))
            .collect()
    }

    /// The store loops publish into
    pub fn store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Registered source count
    pub fn source_count(&self) -> usize {
        self.metrics.len()
    }

    /// Whether `start_all` has run
    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// State of one source's loop task
struct SourceLoop {
    source: SourceId,
    store: Arc<SnapshotStore>,
    metrics: Arc<IngestionMetrics>,
    config: LoopConfig,
    token: CancellationToken,
}

impl SourceLoop {
    #[instrument(name = "source_loop", skip_all, fields(source = %self.source))]
    async fn run(self, mut driver: Box<dyn SourceDriver>) {
        let mut backoff = self.config.backoff.clone();
        info!("source loop started");

        while !self.token.is_cancelled() {
            let read = tokio::select! {
                _ = self.token.cancelled() => break,
                read = read_once(driver) => read,
            };
            let Some((returned, result)) = read else {
                warn!("blocking read task lost, stopping source loop");
                break;
            };
            driver = returned;

            let pause = match result.and_then(|snapshot| self.check_shape(snapshot)) {
                Ok(snapshot) => {
                    let sequence = self.store.publish(self.source, snapshot);
                    self.metrics.record_published(sequence);
                    observability::metrics::record_snapshot_published(self.source, sequence);
                    if backoff.attempt() > 0 {
                        info!(sequence, failures = backoff.attempt(), "source recovered");
                    }
                    backoff.reset();
                    self.config.poll_interval
                }
                Err(error) => {
                    let streak = self.metrics.record_failure();
                    observability::metrics::record_read_failure(self.source, error.kind());
                    let delay = backoff.next_delay();
                    if streak == 1 {
                        warn!(%error, kind = error.kind(), retry_in_ms = delay.as_millis() as u64, "source read failed");
                    } else {
                        debug!(%error, streak, retry_in_ms = delay.as_millis() as u64, "source read failed again");
                    }
                    delay
                }
            };

            if !self.sleep(pause).await {
                break;
            }
        }

        info!(
            reads_ok = self.metrics.snapshot(self.source).reads_ok,
            "source loop stopped"
        );
    }

    fn check_shape(&self, snapshot: SourceSnapshot) -> std::result::Result<SourceSnapshot, DriverError> {
        if self.source.accepts(&snapshot) {
            Ok(snapshot)
        } else {
            Err(DriverError::ShapeMismatch {
                source_id: self.source,
                actual: snapshot.kind(),
            })
        }
    }

    /// Sleep unless cancelled first; false when cancelled
    async fn sleep(&self, pause: Duration) -> bool {
        if pause.is_zero() {
            return !self.token.is_cancelled();
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(pause) => true,
        }
    }
}

/// Run one blocking read on the blocking pool
///
/// The driver travels to the pool thread and back. A panic inside the driver
/// becomes `DriverError::Panicked`; `None` means the task itself was lost
/// (runtime shutting down).
async fn read_once(
    mut driver: Box<dyn SourceDriver>,
) -> Option<(Box<dyn SourceDriver>, std::result::Result<SourceSnapshot, DriverError>)> {
    let joined = tokio::task::spawn_blocking(move || {
        let source = driver.identity();
        let result = panic::catch_unwind(AssertUnwindSafe(|| driver.read_all()))
            .unwrap_or_else(|payload| {
                Err(DriverError::Panicked {
                    source_id: source,
                    message: panic_message(payload.as_ref()),
                })
            });
        (driver, result)
    })
    .await;
    joined.ok()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
