//! # Dispatcher
//!
//! Subscriber side of the hub.
//!
//! Responsibilities:
//! - Accept TCP subscribers, one session task each
//! - Negotiate interval and encoding per subscriber
//! - Aggregate the latest snapshots and stream them at the negotiated cadence
//! - Track live sessions in a registry

pub mod acceptor;
pub mod aggregator;
pub mod encoding;
pub mod error;
pub mod negotiation;
pub mod registry;
pub mod session;

pub use acceptor::{Acceptor, AcceptorStats};
pub use aggregator::{Aggregator, Incomplete};
pub use encoding::{decode_binary, parse_text, render, render_binary, render_text, BinaryFrame, TextFrame, FRAME_LEN};
pub use error::{DispatcherError, FrameError, NegotiationError};
pub use negotiation::{negotiate, parse_request, NegotiationRules, StreamRequest, MAX_REQUEST_LEN};
pub use registry::{SessionGuard, SessionInfo, SessionRegistry, SessionSnapshot};
pub use session::{run_session, CloseReason, SessionContext, SessionEnd};
