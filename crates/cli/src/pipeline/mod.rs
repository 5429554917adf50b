//! Hub orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Hub, HubConfig};
pub use stats::HubStats;
