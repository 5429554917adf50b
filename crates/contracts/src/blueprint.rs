//! HubBlueprint - Config Loader output
//!
//! Describes the full hub configuration: listen socket and session policy,
//! ingestion policy and the three source endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::{ContractError, SourceId};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct HubBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Subscriber-facing server
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Source polling policy
    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    /// Source endpoints
    #[serde(default)]
    #[validate(nested)]
    pub sources: SourcesConfig,
}

/// Wire encoding of streamed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Structured key/value text
    #[default]
    Text,
    /// Fixed little-endian layout
    Binary,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = ContractError;

    /// `json` is accepted as an alias of `text`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "json" => Ok(Self::Text),
            "binary" | "bin" => Ok(Self::Binary),
            other => Err(ContractError::Other(format!("unknown encoding '{other}'"))),
        }
    }
}

/// What a session does when some source never published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompletePolicy {
    /// Send nothing this tick
    #[default]
    Skip,
    /// Send the frame with unavailable blocks marked
    Partial,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Listen address (`host:port`)
    #[serde(default = "default_listen_addr")]
    #[validate(length(min = 1))]
    pub listen_addr: String,

    /// Encoding used when the client does not pick one
    #[serde(default)]
    pub default_encoding: Encoding,

    /// How long a new connection may take to send its request
    #[serde(default = "default_negotiation_timeout_ms")]
    #[validate(range(min = 1))]
    pub negotiation_timeout_ms: u64,

    /// Smallest accepted send interval
    #[serde(default = "default_min_interval_ms")]
    #[validate(range(min = 1))]
    pub min_interval_ms: u64,

    /// Largest accepted send interval
    #[serde(default = "default_max_interval_ms")]
    #[validate(range(min = 1))]
    pub max_interval_ms: u64,

    /// Bound on a single frame write
    #[serde(default = "default_write_timeout_ms")]
    #[validate(range(min = 1))]
    pub write_timeout_ms: u64,

    /// Behaviour before every source has published
    #[serde(default)]
    pub incomplete: IncompletePolicy,

    /// Optional cap on concurrent sessions (None = unbounded)
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_sessions: Option<usize>,

    /// How long shutdown waits for sessions to finish
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Pause after a failed accept
    #[serde(default = "default_accept_error_backoff_ms")]
    pub accept_error_backoff_ms: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8888".to_string()
}

fn default_negotiation_timeout_ms() -> u64 {
    2000
}

fn default_min_interval_ms() -> u64 {
    10
}

fn default_max_interval_ms() -> u64 {
    3_600_000
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_shutdown_grace_ms() -> u64 {
    5000
}

fn default_accept_error_backoff_ms() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            default_encoding: Encoding::default(),
            negotiation_timeout_ms: default_negotiation_timeout_ms(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            incomplete: IncompletePolicy::default(),
            max_sessions: None,
            shutdown_grace_ms: default_shutdown_grace_ms(),
            accept_error_backoff_ms: default_accept_error_backoff_ms(),
        }
    }
}

impl ServerConfig {
    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn accept_error_backoff(&self) -> Duration {
        Duration::from_millis(self.accept_error_backoff_ms)
    }
}

/// Ingestion policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestionConfig {
    /// Age after which the last good snapshot is reported stale
    #[serde(default = "default_stale_after_ms")]
    #[validate(range(min = 1))]
    pub stale_after_ms: u64,

    /// Pause between successful reads (0 = back to back)
    #[serde(default)]
    pub poll_interval_ms: u64,

    /// First retry delay after a failed read
    #[serde(default = "default_backoff_initial_ms")]
    #[validate(range(min = 1))]
    pub backoff_initial_ms: u64,

    /// Retry delay cap
    #[serde(default = "default_backoff_max_ms")]
    #[validate(range(min = 1))]
    pub backoff_max_ms: u64,

    /// Growth factor between retries
    #[serde(default = "default_backoff_multiplier")]
    #[validate(range(min = 1.0))]
    pub backoff_multiplier: f64,
}

fn default_stale_after_ms() -> u64 {
    5000
}

fn default_backoff_initial_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: default_stale_after_ms(),
            poll_interval_ms: 0,
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl IngestionConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Driver implementation behind a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Built-in generator, no hardware required
    #[default]
    Simulated,
}

/// One source endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// Serial device path or network address
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Driver implementation
    #[serde(default)]
    pub driver: DriverKind,

    /// Emulated bus read time (simulated driver only)
    #[serde(default = "default_read_latency_ms")]
    pub read_latency_ms: u64,
}

fn default_read_latency_ms() -> u64 {
    100
}

impl SourceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            driver: DriverKind::default(),
            read_latency_ms: default_read_latency_ms(),
        }
    }
}

/// Endpoints of the three sources
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourcesConfig {
    #[validate(nested)]
    pub spu_ch_a: SourceConfig,

    #[validate(nested)]
    pub spu_ch_b: SourceConfig,

    #[validate(nested)]
    pub plc: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            spu_ch_a: SourceConfig::new("/dev/ttyF0"),
            spu_ch_b: SourceConfig::new("/dev/ttyF1"),
            plc: SourceConfig::new("opc.tcp://127.0.0.1:4840"),
        }
    }
}

impl SourcesConfig {
    /// Endpoint configuration of one source
    pub fn get(&self, source: SourceId) -> &SourceConfig {
        match source {
            SourceId::SpuChA => &self.spu_ch_a,
            SourceId::SpuChB => &self.spu_ch_b,
            SourceId::Plc => &self.plc,
        }
    }

    /// Mutable access, used for CLI overrides
    pub fn get_mut(&mut self, source: SourceId) -> &mut SourceConfig {
        match source {
            SourceId::SpuChA => &mut self.spu_ch_a,
            SourceId::SpuChB => &mut self.spu_ch_b,
            SourceId::Plc => &mut self.plc,
        }
    }
}
