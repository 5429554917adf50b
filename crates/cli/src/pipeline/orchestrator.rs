//! Hub orchestrator - wires ingestion, the snapshot store and the acceptor.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{HubBlueprint, SourceId};
use dispatcher::{Acceptor, Aggregator};
use ingestion::{open_driver, IngestionPipeline, LoopConfig, SnapshotStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::HubStats;

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Validated hub configuration
    pub blueprint: HubBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main hub orchestrator
pub struct Hub {
    config: HubConfig,
}

impl Hub {
    /// Create a new hub with the given configuration
    pub fn new(config: HubConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, then drain sessions and stop ingestion
    pub async fn run<F>(self, shutdown: F) -> Result<HubStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let store = Arc::new(SnapshotStore::new());
        let aggregator = Aggregator::new(store.clone(), blueprint.ingestion.stale_after());

        // Bind before touching any source so a busy port fails fast
        let acceptor = Acceptor::bind(&blueprint.server, aggregator)
            .await
            .with_context(|| format!("Failed to listen on {}", blueprint.server.listen_addr))?;
        let local_addr = acceptor.local_addr()?;

        info!("Setting up ingestion pipeline...");
        let mut ingestion = IngestionPipeline::new(store, LoopConfig::from_config(&blueprint.ingestion));
        for source in SourceId::ALL {
            let source_config = blueprint.sources.get(source);
            ingestion
                .register_driver(open_driver(source, source_config))
                .with_context(|| format!("Failed to register driver for {}", source))?;
            info!(
                source = %source,
                endpoint = %source_config.endpoint,
                driver = ?source_config.driver,
                "Source configured"
            );
        }

        let token = CancellationToken::new();
        ingestion
            .start_all(token.child_token())
            .context("Failed to start ingestion")?;

        let acceptor_task = tokio::spawn(acceptor.run(token.child_token()));
        info!(addr = %local_addr, sources = ingestion.source_count(), "Hub running");

        shutdown.await;

        info!("Shutting down hub...");
        token.cancel();

        let acceptor_stats = match acceptor_task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Acceptor task failed");
                Default::default()
            }
        };

        let grace = blueprint.server.shutdown_grace();
        if tokio::time::timeout(grace, ingestion.join()).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "Source loops did not stop in time");
        }

        let stats = HubStats {
            duration: start_time.elapsed(),
            local_addr: Some(local_addr),
            acceptor: acceptor_stats,
            sources: ingestion.all_metrics(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            sessions = stats.acceptor.accepted,
            "Hub shutdown complete"
        );

        Ok(stats)
    }
}
