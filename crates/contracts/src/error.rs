//! Layered error definitions
//!
//! Categorized by source: config / driver / general

use thiserror::Error;

use crate::SourceId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error returned by a source driver read
///
/// Never fatal for the hub: the ingestion loop keeps the last good snapshot
/// and retries with backoff.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport level failure (serial port, socket)
    #[error("driver io error on {source_id}: {error}")]
    Io {
        source_id: SourceId,
        #[source]
        error: std::io::Error,
    },

    /// Device did not answer in time
    #[error("driver timeout on {source_id} after {waited_ms}ms")]
    Timeout { source_id: SourceId, waited_ms: u64 },

    /// Answer received but could not be decoded
    #[error("driver decode error on {source_id}: {message}")]
    Decode { source_id: SourceId, message: String },

    /// Device link is down
    #[error("driver disconnected: {source_id}")]
    Disconnected { source_id: SourceId },

    /// Driver panicked inside `read_all`
    #[error("driver {source_id} panicked: {message}")]
    Panicked { source_id: SourceId, message: String },

    /// Driver returned a snapshot of the wrong shape for its identity
    #[error("driver {source_id} returned a {actual} snapshot")]
    ShapeMismatch {
        source_id: SourceId,
        actual: &'static str,
    },
}

impl DriverError {
    /// Create decode error
    pub fn decode(source_id: SourceId, message: impl Into<String>) -> Self {
        Self::Decode {
            source_id,
            message: message.into(),
        }
    }

    /// Short stable label (used for logs/metrics)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Timeout { .. } => "timeout",
            Self::Decode { .. } => "decode",
            Self::Disconnected { .. } => "disconnected",
            Self::Panicked { .. } => "panic",
            Self::ShapeMismatch { .. } => "shape_mismatch",
        }
    }
}
