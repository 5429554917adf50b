//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Telemetry Hub - reactor instrument telemetry distribution server
#[derive(Parser, Debug)]
#[command(
    name = "telemetry-hub",
    author,
    version,
    about = "Reactor telemetry distribution hub",
    long_about = "Polls the SPU sensor channels and the PLC, keeps the latest reading of each\n\
                  and streams aggregate frames to TCP subscribers at the interval and in\n\
                  the encoding each subscriber asks for."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TELEMETRY_HUB_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TELEMETRY_HUB_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter implied by `-v`/`-q`
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the hub
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "TELEMETRY_HUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the listen address, e.g. 0.0.0.0:8888
    #[arg(long, env = "TELEMETRY_HUB_LISTEN")]
    pub listen: Option<String>,

    /// Override the encoding used when a client does not name one
    #[arg(long, value_enum, env = "TELEMETRY_HUB_ENCODING")]
    pub encoding: Option<EncodingArg>,

    /// Override the SPU channel A endpoint
    #[arg(long, env = "TELEMETRY_HUB_SPU_CH_A")]
    pub spu_ch_a: Option<String>,

    /// Override the SPU channel B endpoint
    #[arg(long, env = "TELEMETRY_HUB_SPU_CH_B")]
    pub spu_ch_b: Option<String>,

    /// Override the PLC endpoint
    #[arg(long, env = "TELEMETRY_HUB_PLC")]
    pub plc: Option<String>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TELEMETRY_HUB_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Frame encoding as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingArg {
    Text,
    Binary,
}

impl From<EncodingArg> for contracts::Encoding {
    fn from(encoding: EncodingArg) -> Self {
        match encoding {
            EncodingArg::Text => Self::Text,
            EncodingArg::Binary => Self::Binary,
        }
    }
}
