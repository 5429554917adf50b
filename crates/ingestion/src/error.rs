//! Ingestion error types

use contracts::SourceId;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// A driver for this source is already registered
    #[error("a driver for source {source_id} is already registered")]
    DuplicateSource {
        /// Source ID
        source_id: SourceId,
    },

    /// Loops were already started
    #[error("ingestion loops already started")]
    AlreadyStarted,
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
