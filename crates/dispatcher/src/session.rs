//! Session - one subscriber connection
//!
//! Negotiating -> Streaming -> Closed, or Negotiating -> Rejected. The
//! session owns its socket; nothing else writes to it.

use std::net::SocketAddr;
use std::time::Duration;

use contracts::{IncompletePolicy, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::aggregator::Aggregator;
use crate::encoding;
use crate::error::NegotiationError;
use crate::negotiation::{negotiate, NegotiationRules, StreamRequest};
use crate::registry::{SessionGuard, SessionRegistry};

/// Everything a session needs besides its socket
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub aggregator: Aggregator,
    pub registry: SessionRegistry,
    pub rules: NegotiationRules,
    pub write_timeout: Duration,
    pub incomplete: IncompletePolicy,
}

impl SessionContext {
    pub fn new(aggregator: Aggregator, registry: SessionRegistry, config: &ServerConfig) -> Self {
        Self {
            aggregator,
            registry,
            rules: NegotiationRules::from_config(config),
            write_timeout: config.write_timeout(),
            incomplete: config.incomplete,
        }
    }
}

/// Why a streaming session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Read error on the peer side
    PeerError,
    /// Write returned an error
    WriteFailed,
    /// Write did not complete within the write timeout
    WriteTimeout,
    /// Server shutting down
    Shutdown,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerError => "peer_error",
            Self::WriteFailed => "write_failed",
            Self::WriteTimeout => "write_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Terminal state of a session
#[derive(Debug)]
pub enum SessionEnd {
    Rejected(NegotiationError),
    Closed {
        reason: CloseReason,
        frames_sent: u64,
    },
}

impl SessionEnd {
    /// Label for the sessions-closed metric
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::Closed { reason, .. } => reason.as_str(),
        }
    }
}

/// Run a session to completion
///
/// The session is registered for its whole lifetime and observes `token` at
/// every suspension point.
#[instrument(name = "session", skip_all, fields(peer = %peer, session_id = tracing::field::Empty))]
pub async fn run_session<S>(
    stream: S,
    peer: SocketAddr,
    context: SessionContext,
    token: CancellationToken,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let guard = context.registry.register(peer);
    tracing::Span::current().record("session_id", guard.id());
    observability::metrics::record_session_opened();
    debug!("session opened, negotiating");

    let (mut reader, mut writer) = tokio::io::split(stream);

    let negotiated = tokio::select! {
        _ = token.cancelled() => None,
        result = negotiate(&mut reader, &context.rules) => Some(result),
    };

    let end = match negotiated {
        None => SessionEnd::Closed {
            reason: CloseReason::Shutdown,
            frames_sent: 0,
        },
        Some(Err(error)) => {
            info!(reason = error.reason(), %error, "negotiation rejected");
            observability::metrics::record_negotiation_rejected(error.reason());
            SessionEnd::Rejected(error)
        }
        Some(Ok(request)) => {
            guard.info().set_request(request);
            info!(
                interval_ms = request.interval.as_millis() as u64,
                encoding = %request.encoding,
                "streaming"
            );
            let streamer = Streamer {
                context: &context,
                guard: &guard,
                request,
            };
            let (reason, frames_sent) = streamer.run(&mut reader, &mut writer, &token).await;
            SessionEnd::Closed {
                reason,
                frames_sent,
            }
        }
    };

    // best effort, the peer may already be gone
    let _ = timeout(context.write_timeout, writer.shutdown()).await;

    match &end {
        SessionEnd::Closed { reason, frames_sent } => {
            info!(reason = reason.as_str(), frames_sent, "session closed")
        }
        SessionEnd::Rejected(_) => debug!("session rejected"),
    }
    observability::metrics::record_session_closed(end.label());
    drop(guard);
    end
}

struct Streamer<'a> {
    context: &'a SessionContext,
    guard: &'a SessionGuard,
    request: StreamRequest,
}

impl Streamer<'_> {
    async fn run<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        token: &CancellationToken,
    ) -> (CloseReason, u64)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut ticker = interval(self.request.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut discard = [0u8; 256];
        let mut frames_sent = 0u64;
        // a half-closed peer still receives frames; a vanished one fails the next write
        let mut read_open = true;

        let reason = loop {
            tokio::select! {
                _ = token.cancelled() => break CloseReason::Shutdown,
                read = reader.read(&mut discard), if read_open => match read {
                    Ok(0) => {
                        debug!("peer finished sending, streaming continues");
                        read_open = false;
                    }
                    // input after negotiation is ignored
                    Ok(n) => trace!(bytes = n, "ignoring client input"),
                    Err(error) => {
                        debug!(%error, "peer read failed");
                        break CloseReason::PeerError;
                    }
                },
                _ = ticker.tick() => {
                    match self.send_frame(writer).await {
                        Ok(true) => frames_sent += 1,
                        Ok(false) => {}
                        Err(reason) => break reason,
                    }
                }
            }
        };
        (reason, frames_sent)
    }

    /// Aggregate, render and write one frame; `Ok(false)` when skipped
    async fn send_frame<W>(&self, writer: &mut W) -> Result<bool, CloseReason>
    where
        W: AsyncWrite + Unpin,
    {
        let aggregate = match self.context.incomplete {
            IncompletePolicy::Partial => self.context.aggregator.collect_partial(),
            IncompletePolicy::Skip => match self.context.aggregator.collect() {
                Ok(aggregate) => aggregate,
                Err(incomplete) => {
                    trace!(missing = ?incomplete.missing, "aggregate incomplete, skipping tick");
                    self.guard.info().record_skip();
                    observability::metrics::record_frame_skipped();
                    return Ok(false);
                }
            },
        };

        let wire = self.request.encoding;
        let frame = encoding::render(&aggregate, wire);
        match timeout(self.context.write_timeout, writer.write_all(&frame)).await {
            Ok(Ok(())) => {
                self.guard.info().record_frame(frame.len());
                observability::metrics::record_frame_sent(wire, frame.len());
                Ok(true)
            }
            Ok(Err(error)) => {
                debug!(%error, "frame write failed");
                Err(CloseReason::WriteFailed)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.context.write_timeout.as_millis() as u64,
                    "frame write timed out"
                );
                Err(CloseReason::WriteTimeout)
            }
        }
    }
}
