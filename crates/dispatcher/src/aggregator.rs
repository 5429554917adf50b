//! Aggregator - assembles the latest reading of every source

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{AggregateSnapshot, PublishedSnapshot, SourceId, SourceReading};
use ingestion::SnapshotStore;
use thiserror::Error;

/// At least one source never published
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("aggregate incomplete, missing {missing:?}")]
pub struct Incomplete {
    /// Sources without any snapshot, in wire order
    pub missing: Vec<SourceId>,
}

/// Stateless view over the snapshot store
///
/// Every call reads the three slots independently. The result is consistent
/// per source, not across sources.
#[derive(Debug, Clone)]
pub struct Aggregator {
    store: Arc<SnapshotStore>,
    stale_after: Duration,
}

impl Aggregator {
    pub fn new(store: Arc<SnapshotStore>, stale_after: Duration) -> Self {
        Self { store, stale_after }
    }

    /// Full aggregate, or the list of sources that never published
    pub fn collect(&self) -> Result<AggregateSnapshot, Incomplete> {
        let aggregate = self.collect_partial();
        let missing = aggregate.missing();
        if missing.is_empty() {
            Ok(aggregate)
        } else {
            Err(Incomplete { missing })
        }
    }

    /// Aggregate with `None` for sources that never published
    pub fn collect_partial(&self) -> AggregateSnapshot {
        let now = Instant::now();
        AggregateSnapshot {
            spu_ch_a: self.reading(SourceId::SpuChA, now, |p| p.snapshot.as_spu().copied()),
            spu_ch_b: self.reading(SourceId::SpuChB, now, |p| p.snapshot.as_spu().copied()),
            plc: self.reading(SourceId::Plc, now, |p| p.snapshot.as_plc().copied()),
        }
    }

    /// Staleness bound in use
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    fn reading<T>(
        &self,
        source: SourceId,
        now: Instant,
        data: impl FnOnce(&PublishedSnapshot) -> Option<T>,
    ) -> Option<SourceReading<T>> {
        let published = self.store.read_latest(source)?;
        Some(SourceReading {
            sequence: published.sequence,
            freshness: published.freshness(now, self.stale_after),
            age: published.age(now),
            data: data(published.as_ref())?,
        })
    }
}
