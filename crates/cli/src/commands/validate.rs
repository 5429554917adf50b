//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{HubBlueprint, SourceId};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    listen_addr: String,
    default_encoding: String,
    source_count: usize,
    stale_after_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    listen_addr: blueprint.server.listen_addr.clone(),
                    default_encoding: blueprint.server.default_encoding.to_string(),
                    source_count: SourceId::ALL.len(),
                    stale_after_ms: blueprint.ingestion.stale_after_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &HubBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let sources = &blueprint.sources;

    if sources.spu_ch_a.endpoint == sources.spu_ch_b.endpoint {
        warnings.push(format!(
            "spu_ch_a and spu_ch_b share endpoint '{}'",
            sources.spu_ch_a.endpoint
        ));
    }

    let ingestion = &blueprint.ingestion;
    if ingestion.stale_after_ms <= ingestion.poll_interval_ms {
        warnings.push(format!(
            "ingestion.stale_after_ms ({}) <= poll_interval_ms ({}) - snapshots will always be stale",
            ingestion.stale_after_ms, ingestion.poll_interval_ms
        ));
    }

    for source in SourceId::ALL {
        let latency = sources.get(source).read_latency_ms;
        if latency >= ingestion.stale_after_ms {
            warnings.push(format!(
                "sources.{}.read_latency_ms ({}) >= stale_after_ms ({})",
                source, latency, ingestion.stale_after_ms
            ));
        }
    }

    let server = &blueprint.server;
    if server.negotiation_timeout_ms > server.shutdown_grace_ms {
        warnings.push(format!(
            "server.negotiation_timeout_ms ({}) exceeds shutdown_grace_ms ({})",
            server.negotiation_timeout_ms, server.shutdown_grace_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Listen: {}", summary.listen_addr);
            println!("  Default encoding: {}", summary.default_encoding);
            println!("  Sources: {}", summary.source_count);
            println!("  Stale after: {} ms", summary.stale_after_ms);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
