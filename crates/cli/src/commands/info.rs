//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{HubBlueprint, SourceId};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    ingestion: IngestionInfo,
    sources: Vec<SourceInfo>,
}

#[derive(Serialize)]
struct ServerInfo {
    listen_addr: String,
    default_encoding: String,
    min_interval_ms: u64,
    max_interval_ms: u64,
    negotiation_timeout_ms: u64,
    write_timeout_ms: u64,
    incomplete: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_sessions: Option<usize>,
}

#[derive(Serialize)]
struct IngestionInfo {
    stale_after_ms: u64,
    poll_interval_ms: u64,
    backoff_initial_ms: u64,
    backoff_max_ms: u64,
    backoff_multiplier: f64,
}

#[derive(Serialize)]
struct SourceInfo {
    id: String,
    block: String,
    endpoint: String,
    driver: String,
    read_latency_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    match &args.config {
        Some(path) => info!(config = %path.display(), "Loading configuration info"),
        None => info!("Showing built-in defaults"),
    }

    let blueprint = load_blueprint(args.config.as_deref())?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &HubBlueprint) -> ConfigInfo {
    let server = &blueprint.server;
    let ingestion = &blueprint.ingestion;

    let sources = SourceId::ALL
        .into_iter()
        .map(|source| {
            let config = blueprint.sources.get(source);
            SourceInfo {
                id: source.config_key().to_string(),
                block: source.wire_key().to_string(),
                endpoint: config.endpoint.clone(),
                driver: format!("{:?}", config.driver),
                read_latency_ms: config.read_latency_ms,
            }
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        server: ServerInfo {
            listen_addr: server.listen_addr.clone(),
            default_encoding: server.default_encoding.to_string(),
            min_interval_ms: server.min_interval_ms,
            max_interval_ms: server.max_interval_ms,
            negotiation_timeout_ms: server.negotiation_timeout_ms,
            write_timeout_ms: server.write_timeout_ms,
            incomplete: format!("{:?}", server.incomplete),
            max_sessions: server.max_sessions,
        },
        ingestion: IngestionInfo {
            stale_after_ms: ingestion.stale_after_ms,
            poll_interval_ms: ingestion.poll_interval_ms,
            backoff_initial_ms: ingestion.backoff_initial_ms,
            backoff_max_ms: ingestion.backoff_max_ms,
            backoff_multiplier: ingestion.backoff_multiplier,
        },
        sources,
    }
}

fn print_config_info(blueprint: &HubBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Telemetry Hub Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let server = &blueprint.server;
    println!("🔌 Server");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Listen: {}", server.listen_addr);
    println!("   ├─ Default encoding: {}", server.default_encoding);
    println!(
        "   ├─ Interval range: {}..={} ms",
        server.min_interval_ms, server.max_interval_ms
    );
    println!("   ├─ Negotiation timeout: {} ms", server.negotiation_timeout_ms);
    println!("   ├─ Write timeout: {} ms", server.write_timeout_ms);
    println!("   ├─ Incomplete aggregates: {:?}", server.incomplete);
    match server.max_sessions {
        Some(max) => println!("   └─ Max sessions: {}", max),
        None => println!("   └─ Max sessions: unbounded"),
    }

    let ingestion = &blueprint.ingestion;
    println!("\n⚙️  Ingestion");
    println!("   ├─ Stale after: {} ms", ingestion.stale_after_ms);
    println!("   ├─ Poll interval: {} ms", ingestion.poll_interval_ms);
    println!(
        "   └─ Backoff: {}..{} ms (x{})",
        ingestion.backoff_initial_ms, ingestion.backoff_max_ms, ingestion.backoff_multiplier
    );

    println!("\n📡 Sources ({})", SourceId::ALL.len());
    for (i, source) in SourceId::ALL.into_iter().enumerate() {
        let prefix = if i == SourceId::ALL.len() - 1 { "└─" } else { "├─" };
        let config = blueprint.sources.get(source);
        println!(
            "   {} {} → {} ({:?}, {} ms)",
            prefix,
            source.wire_key(),
            config.endpoint,
            config.driver,
            config.read_latency_ms
        );
    }

    println!();
}
