//! # Telemetry Hub CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - Hub orchestration and lifecycle management
//! - Graceful shutdown handling

mod cli;
mod commands;
mod pipeline;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_hub, run_info, run_validate};

/// How long exit waits on driver reads still blocked after the hub stopped
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: cli.log_level().to_string(),
        force_level: cli.quiet,
    })?;

    info!(version = env!("CARGO_PKG_VERSION"), "Telemetry Hub starting");

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = run_to_completion(runtime, async {
        match &cli.command {
            Commands::Run(args) => run_hub(args).await,
            Commands::Validate(args) => run_validate(args),
            Commands::Info(args) => run_info(args),
        }
    });

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Drive `future` to completion, then tear the runtime down without waiting
/// indefinitely on blocking driver reads that never returned
fn run_to_completion<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use contracts::{DriverError, SourceDriver, SourceId, SourceSnapshot};
    use ingestion::{IngestionPipeline, LoopConfig, SnapshotStore};
    use tokio_util::sync::CancellationToken;

    /// Driver whose read never returns, like a dead serial line
    struct StuckDriver;

    impl SourceDriver for StuckDriver {
        fn identity(&self) -> SourceId {
            SourceId::SpuChA
        }

        fn read_all(&mut self) -> Result<SourceSnapshot, DriverError> {
            loop {
                std::thread::park();
            }
        }
    }

    #[test]
    fn test_stuck_driver_does_not_block_exit() {
        let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
        let started = Instant::now();

        let stopped = run_to_completion(runtime, async {
            let mut ingestion =
                IngestionPipeline::new(Arc::new(SnapshotStore::new()), LoopConfig::default());
            ingestion.register_driver(Box::new(StuckDriver)).unwrap();
            let token = CancellationToken::new();
            ingestion.start_all(token.clone()).unwrap();

            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
            tokio::time::timeout(Duration::from_secs(1), ingestion.join())
                .await
                .is_ok()
        });

        assert!(stopped, "source loop ignored cancellation");
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "runtime teardown waited on the blocked read"
        );
    }
}
