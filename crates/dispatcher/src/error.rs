//! Dispatcher error types

use std::net::SocketAddr;

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Listen address could not be parsed
    #[error("invalid listen address '{addr}': {message}")]
    InvalidAddress { addr: String, message: String },

    /// Listen address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a negotiation request was refused
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Peer closed without sending anything
    #[error("connection closed before a request was received")]
    Empty,

    /// Nothing received before the negotiation deadline
    #[error("no request received within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// Request exceeds the maximum length
    #[error("request too long ({len} bytes, max {max})")]
    TooLong { len: usize, max: usize },

    /// Interval is missing or not a non-negative integer
    #[error("interval '{value}' is not a number")]
    NotANumber { value: String },

    /// Interval outside the accepted range
    #[error("interval {interval_ms}ms outside [{min_ms}, {max_ms}]")]
    OutOfRange {
        interval_ms: u64,
        min_ms: u64,
        max_ms: u64,
    },

    /// Encoding token not recognised
    #[error("unknown encoding '{value}'")]
    UnknownEncoding { value: String },

    /// More tokens than `<interval> [encoding]`
    #[error("malformed request '{line}'")]
    Malformed { line: String },

    /// Transport failure while reading the request
    #[error("io error during negotiation: {0}")]
    Io(#[from] std::io::Error),
}

impl NegotiationError {
    /// Stable label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Timeout { .. } => "timeout",
            Self::TooLong { .. } => "too_long",
            Self::NotANumber { .. } => "not_a_number",
            Self::OutOfRange { .. } => "out_of_range",
            Self::UnknownEncoding { .. } => "unknown_encoding",
            Self::Malformed { .. } => "malformed",
            Self::Io(_) => "io",
        }
    }
}

/// A binary or text frame could not be decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {len} bytes, expected {expected}")]
    TooShort { len: usize, expected: usize },

    #[error("bad frame magic {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),

    #[error("text frame line {line}: {message}")]
    Text { line: usize, message: String },
}
