//! Configuration validation
//!
//! Rules:
//! - per-field bounds declared on the config types (`validator` derive)
//! - listen_addr is a socket address
//! - min_interval_ms <= max_interval_ms
//! - backoff_initial_ms <= backoff_max_ms

use std::net::SocketAddr;

use contracts::{ContractError, HubBlueprint};
use ::validator::Validate;

/// Validate a HubBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_listen_addr(blueprint)?;
    validate_interval_range(blueprint)?;
    validate_backoff(blueprint)?;
    Ok(())
}

/// Declarative per-field bounds
fn validate_fields(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

fn validate_listen_addr(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    let addr = &blueprint.server.listen_addr;
    addr.parse::<SocketAddr>().map(|_| ()).map_err(|e| {
        ContractError::config_validation(
            "server.listen_addr",
            format!("'{addr}' is not a socket address: {e}"),
        )
    })
}

fn validate_interval_range(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    let server = &blueprint.server;
    if server.min_interval_ms > server.max_interval_ms {
        return Err(ContractError::config_validation(
            "server.min_interval_ms / server.max_interval_ms",
            format!(
                "min_interval_ms ({}) must be <= max_interval_ms ({})",
                server.min_interval_ms, server.max_interval_ms
            ),
        ));
    }
    Ok(())
}

fn validate_backoff(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    let ingestion = &blueprint.ingestion;
    if ingestion.backoff_initial_ms > ingestion.backoff_max_ms {
        return Err(ContractError::config_validation(
            "ingestion.backoff_initial_ms / ingestion.backoff_max_ms",
            format!(
                "backoff_initial_ms ({}) must be <= backoff_max_ms ({})",
                ingestion.backoff_initial_ms, ingestion.backoff_max_ms
            ),
        ));
    }
    Ok(())
}
