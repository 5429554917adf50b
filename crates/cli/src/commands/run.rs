//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{HubBlueprint, SourceId};
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::{Hub, HubConfig};

/// Execute the `run` command
pub async fn run_hub(args: &RunArgs) -> Result<()> {
    match &args.config {
        Some(path) => info!(config = %path.display(), "Loading configuration"),
        None => info!("No configuration file given, using built-in defaults"),
    }

    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, args);

    // Overrides bypass the loader, so validate again
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after command-line overrides")?;

    info!(
        listen = %blueprint.server.listen_addr,
        default_encoding = %blueprint.server.default_encoding,
        spu_ch_a = %blueprint.sources.spu_ch_a.endpoint,
        spu_ch_b = %blueprint.sources.spu_ch_b.endpoint,
        plc = %blueprint.sources.plc.endpoint,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let hub = Hub::new(HubConfig {
        blueprint,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    let stats = hub
        .run(shutdown_signal())
        .await
        .context("Hub execution failed")?;

    stats.print_summary();
    info!("Telemetry Hub finished");
    Ok(())
}

fn apply_overrides(blueprint: &mut HubBlueprint, args: &RunArgs) {
    if let Some(ref listen) = args.listen {
        info!(listen = %listen, "Overriding listen address from CLI");
        blueprint.server.listen_addr = listen.clone();
    }
    if let Some(encoding) = args.encoding {
        blueprint.server.default_encoding = encoding.into();
    }
    let endpoints = [
        (SourceId::SpuChA, &args.spu_ch_a),
        (SourceId::SpuChB, &args.spu_ch_b),
        (SourceId::Plc, &args.plc),
    ];
    for (source, endpoint) in endpoints {
        if let Some(endpoint) = endpoint {
            info!(source = %source, endpoint = %endpoint, "Overriding endpoint from CLI");
            blueprint.sources.get_mut(source).endpoint = endpoint.clone();
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping hub...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &HubBlueprint) {
    let server = &blueprint.server;
    println!("\n=== Configuration Summary ===\n");
    println!("Server:");
    println!("  Listen: {}", server.listen_addr);
    println!("  Default encoding: {}", server.default_encoding);
    println!(
        "  Interval range: {}..={} ms",
        server.min_interval_ms, server.max_interval_ms
    );
    println!("  Incomplete aggregates: {:?}", server.incomplete);
    match server.max_sessions {
        Some(max) => println!("  Max sessions: {}", max),
        None => println!("  Max sessions: unbounded"),
    }

    println!("\nSources:");
    for source in SourceId::ALL {
        let config = blueprint.sources.get(source);
        println!("  - {} -> {} ({:?})", source.wire_key(), config.endpoint, config.driver);
    }

    println!(
        "\nStale after: {} ms, retry backoff {}..{} ms",
        blueprint.ingestion.stale_after_ms,
        blueprint.ingestion.backoff_initial_ms,
        blueprint.ingestion.backoff_max_ms
    );
    println!();
}
