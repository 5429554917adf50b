//! Connection acceptor

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use contracts::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::error::DispatcherError;
use crate::registry::SessionRegistry;
use crate::session::{run_session, SessionContext};

/// Counters reported when the acceptor stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptorStats {
    pub accepted: u64,
    pub refused: u64,
    pub accept_errors: u64,
    /// Sessions still running when the grace period ran out
    pub abandoned: usize,
}

/// Accepts subscribers and spawns one session task each
pub struct Acceptor {
    listener: TcpListener,
    context: SessionContext,
    sessions: TaskTracker,
    limit: Option<Arc<Semaphore>>,
    accept_error_backoff: Duration,
    shutdown_grace: Duration,
}

impl Acceptor {
    /// Bind `config.listen_addr`
    ///
    /// # Errors
    /// The only fatal error of the hub: the address does not parse or cannot
    /// be bound.
    #[instrument(name = "acceptor_bind", skip_all, fields(addr = %config.listen_addr))]
    pub async fn bind(config: &ServerConfig, aggregator: Aggregator) -> Result<Self, DispatcherError> {
        let addr: SocketAddr =
            config
                .listen_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| DispatcherError::InvalidAddress {
                    addr: config.listen_addr.clone(),
                    message: e.to_string(),
                })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| DispatcherError::Bind { addr, source })?;

        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            context: SessionContext::new(aggregator, SessionRegistry::new(), config),
            sessions: TaskTracker::new(),
            limit: config.max_sessions.map(|n| Arc::new(Semaphore::new(n))),
            accept_error_backoff: config.accept_error_backoff(),
            shutdown_grace: config.shutdown_grace(),
        })
    }

    /// Actual bound address (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, DispatcherError> {
        Ok(self.listener.local_addr()?)
    }

    /// Registry of this acceptor's sessions
    pub fn registry(&self) -> SessionRegistry {
        self.context.registry.clone()
    }

    /// Accept until `token` is cancelled, then drain sessions
    ///
    /// Sessions get a child token; after cancellation they have
    /// `shutdown_grace` to finish before being abandoned.
    #[instrument(name = "acceptor_run", skip_all)]
    pub async fn run(self, token: CancellationToken) -> AcceptorStats {
        let mut stats = AcceptorStats::default();

        loop {
            let accepted = tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    stats.accepted += 1;
                    if !self.spawn_session(stream, peer, &token) {
                        stats.refused += 1;
                    }
                }
                Err(error) => {
                    stats.accept_errors += 1;
                    observability::metrics::record_accept_error();
                    warn!(%error, "accept failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.accept_error_backoff) => {}
                    }
                }
            }
        }

        let Self {
            listener,
            context,
            sessions,
            shutdown_grace,
            ..
        } = self;
        drop(listener);
        sessions.close();

        info!(active = context.registry.active_count(), "stopped accepting, draining sessions");
        if tokio::time::timeout(shutdown_grace, sessions.wait()).await.is_err() {
            stats.abandoned = sessions.len();
            warn!(
                remaining = stats.abandoned,
                grace_ms = shutdown_grace.as_millis() as u64,
                "sessions still running after grace period"
            );
        }
        info!(
            accepted = stats.accepted,
            refused = stats.refused,
            accept_errors = stats.accept_errors,
            "acceptor stopped"
        );
        stats
    }

    /// Spawn a session; false if refused by the session limit
    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, token: &CancellationToken) -> bool {
        let permit = match &self.limit {
            None => None,
            Some(limit) => match Arc::clone(limit).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(%peer, "session limit reached, closing connection");
                    observability::metrics::record_negotiation_rejected("max_sessions");
                    drop(stream);
                    return false;
                }
            },
        };

        if let Err(error) = stream.set_nodelay(true) {
            debug!(%peer, %error, "failed to set TCP_NODELAY");
        }
        debug!(%peer, "connection accepted");

        let context = self.context.clone();
        let session_token = token.child_token();
        self.sessions.spawn(async move {
            run_session(stream, peer, context, session_token).await;
            drop(permit);
        });
        true
    }
}
