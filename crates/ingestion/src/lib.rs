//! # Ingestion
//!
//! Source polling and the snapshot store.
//!
//! Responsibilities:
//! - Own one `SourceDriver` per instrument source
//! - Run one loop task per source, blocking reads on the blocking pool
//! - Publish every good reading into the `SnapshotStore`
//! - Retry failing sources with bounded exponential backoff
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{open_driver, IngestionPipeline, LoopConfig, SnapshotStore};
//!
//! let store = Arc::new(SnapshotStore::new());
//! let mut pipeline = IngestionPipeline::new(store.clone(), LoopConfig::from_config(&bp.ingestion));
//! for id in SourceId::ALL {
//!     pipeline.register_driver(open_driver(id, bp.sources.get(id)))?;
//! }
//! pipeline.start_all(token.clone())?;
//!
//! let latest = store.read_latest(SourceId::Plc);
//! ```
//!
//! ## Testing
//!
//! ```ignore
//! use ingestion::ScriptedDriver;
//!
//! let (driver, handle) = ScriptedDriver::new(SourceId::SpuChA);
//! handle.push_ok(snapshot);
//! ```

mod backoff;
mod config;
mod error;
mod mock;
mod pipeline;
mod simulated;
mod store;

// Re-exports
pub use backoff::Backoff;
pub use config::{IngestionMetrics, LoopConfig, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use mock::{ScriptHandle, ScriptStep, ScriptedDriver};
pub use pipeline::IngestionPipeline;
pub use simulated::{open_driver, SimulatedPlcDriver, SimulatedSpuDriver};
pub use store::SnapshotStore;
