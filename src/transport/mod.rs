//! Transport abstraction.
//!
//! The socket never talks to the network directly. Every connect attempt asks
//! a [`TransportFactory`] for a fresh [`Transport`] and listens for the
//! [`TransportEvent`]s it reports through an [`EventSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐   create(request, sink)   ┌──────────────────┐
//! │ ReconnectingSocket │──────────────────────────►│ TransportFactory │
//! │                    │                           └──────────────────┘
//! │   driver task      │◄── TransportEvent ────────┐
//! │   (one per socket) │                           │
//! │                    │── send / close ──►┌───────┴────────┐
//! └────────────────────┘                   │   Transport    │
//!                                          │ (one attempt)  │
//!                                          └────────────────┘
//! ```
//!
//! # Contract
//!
//! A transport reports `Open` at most once and `Closed` exactly once, after
//! which it is discarded and never reused. `close` must eventually produce a
//! `Closed` event, including when called before the handshake finished.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-process transport driven by test code |
//! | `websocket` | Network transport over tokio-tungstenite |

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use url::Url;

use crate::config::BinaryType;
use crate::error::Result;
use crate::identifiers::AttemptId;
use crate::protocol::Frame;
use crate::socket::Signal;

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport for tests and simulations.
pub mod memory;

/// WebSocket transport over tokio-tungstenite.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryTransport, MemoryTransportFactory};
pub use websocket::WebSocketFactory;

// ============================================================================
// Constants
// ============================================================================

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Endpoint is going away.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close frame carried no status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

// ============================================================================
// Traits
// ============================================================================

/// One underlying connection.
///
/// Both methods must return immediately; outcomes are reported as events.
/// The socket calls them while holding its state lock, so an implementation
/// must not call back into the socket from either of them.
pub trait Transport: Send + Sync {
    /// Queues a frame for transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport can no longer accept frames.
    fn send(&self, frame: Frame) -> Result<()>;

    /// Requests closure with the given close code and reason.
    fn close(&self, code: u16, reason: &str);
}

/// Creates transports, one per connect attempt.
///
/// This is the seam for substituting the network in tests.
pub trait TransportFactory: Send + Sync {
    /// Starts a new connect attempt.
    ///
    /// Failures are reported through `events`, never returned. The socket
    /// does not hold its state lock during this call, and events emitted
    /// before it returns are delivered once the transport is installed.
    fn create(&self, request: ConnectRequest, events: EventSink) -> Box<dyn Transport>;
}

// ============================================================================
// ConnectRequest
// ============================================================================

/// Everything a factory needs to start one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    /// Attempt this transport belongs to.
    pub attempt: AttemptId,
    /// Endpoint address.
    pub url: Url,
    /// Offered sub-protocols, in preference order.
    pub protocols: Vec<String>,
    /// Binary frame representation hint.
    pub binary_type: BinaryType,
}

// ============================================================================
// Events
// ============================================================================

/// Close details reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close status code.
    pub code: u16,
    /// Close reason text.
    pub reason: String,
    /// Whether the closing handshake completed.
    pub was_clean: bool,
}

impl CloseInfo {
    /// Creates close details.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    /// Creates details for a connection that dropped without a close frame.
    #[inline]
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_ABNORMAL, reason, false)
    }
}

/// Notification reported by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed.
    Open {
        /// Sub-protocol selected by the server, if any.
        protocol: Option<String>,
    },
    /// Frame received.
    Message(Frame),
    /// Transport-level error. Does not imply closure.
    Error {
        /// Description of the error.
        message: String,
    },
    /// Transport closed. Always the last event of an attempt.
    Closed(CloseInfo),
}

// ============================================================================
// EventSink
// ============================================================================

/// Delivers transport events to the owning socket.
///
/// Events are tagged with the attempt the sink was created for.
#[derive(Debug, Clone)]
pub struct EventSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<Signal>,
}

impl EventSink {
    pub(crate) fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { attempt, tx }
    }

    /// Reports an event.
    ///
    /// Returns `false` if the socket no longer exists.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(Signal::Transport {
                attempt: self.attempt,
                event,
            })
            .is_ok()
    }

    /// Returns `true` if the socket no longer exists.
    #[inline]
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }
}
