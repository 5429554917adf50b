//! Snapshot store
//!
//! The only shared mutable state of the hub. One slot per source, each slot a
//! `watch` cell holding `Option<Arc<PublishedSnapshot>>`:
//! - readers clone the `Arc` and release the slot immediately, so a reader
//!   never holds up the writer or another reader
//! - the writer replaces the pointer; snapshots already handed out stay valid
//! - sequence numbers are assigned under the slot lock, so visibility never
//!   goes backwards even with several writers for one source

use std::sync::Arc;
use std::time::Instant;

use contracts::{PublishedSnapshot, SourceId, SourceSnapshot};
use tokio::sync::watch;
use tracing::trace;

type Slot = watch::Sender<Option<Arc<PublishedSnapshot>>>;

/// Latest snapshot per source
#[derive(Debug)]
pub struct SnapshotStore {
    slots: [Slot; SourceId::ALL.len()],
}

impl SnapshotStore {
    /// Create an empty store (every source unavailable)
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| watch::Sender::new(None)),
        }
    }

    /// Install `snapshot` as the latest value for `source`
    ///
    /// Returns the sequence number assigned to it.
    pub fn publish(&self, source: SourceId, snapshot: SourceSnapshot) -> u64 {
        let mut sequence = 0;
        self.slot(source).send_modify(|current| {
            sequence = current.as_ref().map_or(0, |p| p.sequence) + 1;
            *current = Some(Arc::new(PublishedSnapshot {
                source,
                sequence,
                published_at: Instant::now(),
                snapshot,
            }));
        });
        trace!(source = %source, sequence, "snapshot published");
        sequence
    }

    /// Latest snapshot for `source`, `None` if nothing was ever published
    pub fn read_latest(&self, source: SourceId) -> Option<Arc<PublishedSnapshot>> {
        self.slot(source).borrow().clone()
    }

    /// Sequence of the latest snapshot (0 = never published)
    pub fn sequence(&self, source: SourceId) -> u64 {
        self.slot(source)
            .borrow()
            .as_ref()
            .map_or(0, |p| p.sequence)
    }

    /// Watch a source for new publishes
    pub fn subscribe(&self, source: SourceId) -> watch::Receiver<Option<Arc<PublishedSnapshot>>> {
        self.slot(source).subscribe()
    }

    /// Sources that have published at least once
    pub fn available(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.sequence(*id) > 0)
            .collect()
    }

    fn slot(&self, source: SourceId) -> &Slot {
        &self.slots[source.index()]
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PlcSnapshot, SpuSnapshot};
    use std::thread;

    fn spu(n_data: f32) -> SourceSnapshot {
        SourceSnapshot::Spu(SpuSnapshot {
            n_data,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_store_is_unavailable() {
        let store = SnapshotStore::new();
        for id in SourceId::ALL {
            assert!(store.read_latest(id).is_none());
            assert_eq!(store.sequence(id), 0);
        }
        assert!(store.available().is_empty());
    }

    #[test]
    fn test_publish_replaces_and_counts() {
        let store = SnapshotStore::new();
        assert_eq!(store.publish(SourceId::SpuChA, spu(1.0)), 1);
        assert_eq!(store.publish(SourceId::SpuChA, spu(2.0)), 2);

        let latest = store.read_latest(SourceId::SpuChA).unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(latest.snapshot.as_spu().unwrap().n_data, 2.0);
        assert_eq!(latest.source, SourceId::SpuChA);

        // other slots untouched
        assert!(store.read_latest(SourceId::SpuChB).is_none());
        assert_eq!(store.available(), vec![SourceId::SpuChA]);
    }

    #[test]
    fn test_reader_copy_survives_replacement() {
        let store = SnapshotStore::new();
        store.publish(SourceId::Plc, SourceSnapshot::Plc(PlcSnapshot::default()));
        let held = store.read_latest(SourceId::Plc).unwrap();

        store.publish(
            SourceId::Plc,
            SourceSnapshot::Plc(PlcSnapshot {
                state: 9,
                ..Default::default()
            }),
        );

        assert_eq!(held.sequence, 1);
        assert_eq!(held.snapshot.as_plc().unwrap().state, 0);
        assert_eq!(store.read_latest(SourceId::Plc).unwrap().sequence, 2);
    }

    #[test]
    fn test_concurrent_readers_never_go_backwards() {
        let store = Arc::new(SnapshotStore::new());
        let publishes = 5_000u64;

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=publishes {
                    store.publish(SourceId::SpuChB, spu(i as f32));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut last = 0u64;
                    while last < publishes {
                        if let Some(p) = store.read_latest(SourceId::SpuChB) {
                            assert!(p.sequence >= last, "went backwards: {} < {}", p.sequence, last);
                            // value published with sequence i carries n_data == i
                            assert_eq!(p.snapshot.as_spu().unwrap().n_data, p.sequence as f32);
                            last = p.sequence;
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[tokio::test]
    async fn test_subscribe_sees_publish() {
        let store = SnapshotStore::new();
        let mut rx = store.subscribe(SourceId::SpuChA);

        store.publish(SourceId::SpuChA, spu(12.5));
        rx.changed().await.unwrap();

        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.sequence, 1);
    }
}
