//! Session registry
//!
//! Every connection is registered on accept and unregistered when its
//! [`SessionGuard`] drops, whatever path the session took to end.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::Encoding;
use parking_lot::{Mutex, RwLock};

use crate::negotiation::StreamRequest;

/// Live state of one session
#[derive(Debug)]
pub struct SessionInfo {
    pub id: u64,
    pub peer: SocketAddr,
    pub opened_at: Instant,
    request: Mutex<Option<StreamRequest>>,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    frames_skipped: AtomicU64,
}

impl SessionInfo {
    fn new(id: u64, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            opened_at: Instant::now(),
            request: Mutex::new(None),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
        }
    }

    /// Negotiation succeeded
    pub fn set_request(&self, request: StreamRequest) {
        *self.request.lock() = Some(request);
    }

    pub fn record_frame(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let request = *self.request.lock();
        SessionSnapshot {
            id: self.id,
            peer: self.peer,
            uptime: self.opened_at.elapsed(),
            interval: request.map(|r| r.interval),
            encoding: request.map(|r| r.encoding),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a [`SessionInfo`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: u64,
    pub peer: SocketAddr,
    pub uptime: Duration,
    /// `None` while still negotiating
    pub interval: Option<Duration>,
    pub encoding: Option<Encoding>,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub frames_skipped: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    sessions: RwLock<HashMap<u64, Arc<SessionInfo>>>,
    next_id: AtomicU64,
    total_opened: AtomicU64,
}

/// Registry of live sessions, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection; it stays registered while the guard lives
    pub fn register(&self, peer: SocketAddr) -> SessionGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let info = Arc::new(SessionInfo::new(id, peer));
        self.inner.sessions.write().insert(id, Arc::clone(&info));
        self.inner.total_opened.fetch_add(1, Ordering::Relaxed);
        SessionGuard {
            registry: self.clone(),
            info,
        }
    }

    fn unregister(&self, id: u64) {
        self.inner.sessions.write().remove(&id);
    }

    pub fn active_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Sessions registered since start
    pub fn total_opened(&self) -> u64 {
        self.inner.total_opened.load(Ordering::Relaxed)
    }

    pub fn get(&self, id: u64) -> Option<SessionSnapshot> {
        self.inner.sessions.read().get(&id).map(|s| s.snapshot())
    }

    /// Snapshot of every live session, ordered by id
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        let mut list: Vec<_> = self
            .inner
            .sessions
            .read()
            .values()
            .map(|s| s.snapshot())
            .collect();
        list.sort_by_key(|s| s.id);
        list
    }
}

/// Keeps a session registered until dropped
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    info: Arc<SessionInfo>,
}

impl SessionGuard {
    pub fn id(&self) -> u64 {
        self.info.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.info.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_guard_unregisters_on_drop() {
        let registry = SessionRegistry::new();
        let a = registry.register(peer(1000));
        let b = registry.register(peer(1001));
        assert_eq!(registry.active_count(), 2);
        assert_ne!(a.id(), b.id());

        drop(a);
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.sessions()[0].peer, peer(1001));

        drop(b);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.total_opened(), 2);
    }

    #[test]
    fn test_snapshot_tracks_request_and_traffic() {
        let registry = SessionRegistry::new();
        let guard = registry.register(peer(2000));

        let before = registry.get(guard.id()).unwrap();
        assert_eq!(before.interval, None);

        guard.info().set_request(StreamRequest {
            interval: Duration::from_millis(200),
            encoding: Encoding::Binary,
        });
        guard.info().record_frame(288);
        guard.info().record_frame(288);
        guard.info().record_skip();

        let after = registry.get(guard.id()).unwrap();
        assert_eq!(after.interval, Some(Duration::from_millis(200)));
        assert_eq!(after.encoding, Some(Encoding::Binary));
        assert_eq!(after.frames_sent, 2);
        assert_eq!(after.bytes_sent, 576);
        assert_eq!(after.frames_skipped, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SessionRegistry::new();
        let clone = registry.clone();
        let _guard = clone.register(peer(3000));
        assert_eq!(registry.active_count(), 1);
    }
}
