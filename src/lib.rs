//! Reconnecting socket - a WebSocket-like connection that heals itself.
//!
//! This library wraps a single WebSocket connection behind a controller that
//! keeps it alive: lost connections are retried with exponential backoff,
//! stalled handshakes are cut off by a connect timeout, and callers see one
//! stable set of notifications no matter how many transports come and go.
//!
//! # Architecture
//!
//! - **Socket**: [`ReconnectingSocket`] owns the lifecycle state and a driver
//!   task that applies transport events and timer expiry one at a time
//! - **Transport**: one [`Transport`] per connect attempt, created by a
//!   [`TransportFactory`] ([`WebSocketFactory`] in production,
//!   [`MemoryTransportFactory`] in tests)
//! - **Handler**: a [`SocketHandler`] receives `connecting`, `open`, `close`,
//!   `error` and decoded inbound messages
//!
//! Key design principles:
//!
//! - At most one transport is live at a time
//! - Events from a discarded transport are ignored
//! - Only the first failure of a reconnect episode is reported as a close
//! - Nothing is queued while disconnected
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use reconnecting_socket::{Callbacks, Envelope, ReconnectingSocket, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let handler = Callbacks::new()
//!         .with_open(|event| println!("open (reconnect: {})", event.is_reconnect))
//!         .with_message_logic(|message| {
//!             println!("received {message}");
//!             Ok(())
//!         });
//!
//!     let socket = ReconnectingSocket::builder("ws://127.0.0.1:9001/feed")
//!         .timeout_interval(Duration::from_secs(5))
//!         .max_reconnect_attempts(10)
//!         .handler(handler)
//!         .build()?;
//!
//!     let mut status = socket.subscribe_status();
//!     status.changed().await.ok();
//!
//!     socket.send(Envelope::new("subscribe"))?;
//!     socket.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Connection options and their defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frames, envelopes and the decode step |
//! | [`socket`] | The reconnecting controller and its handler |
//! | [`transport`] | Transport abstraction and implementations |

// ============================================================================
// Modules
// ============================================================================

/// Connection configuration.
///
/// All options have defaults; see [`ConnectionConfig`].
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Message payload types.
///
/// Frames on the wire, the `{status, data}` envelope, and decoding.
pub mod protocol;

/// The reconnecting socket.
///
/// Use [`ReconnectingSocket::builder()`] to create a configured instance.
pub mod socket;

/// Transport layer.
///
/// One transport per connect attempt, reporting events back to the socket.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{BinaryType, ConnectionConfig};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::AttemptId;

// Protocol types
pub use protocol::{Envelope, Frame, Payload, decode_envelope, decode_frame};

// Socket types
pub use socket::{
    Backoff, Callbacks, CloseCause, CloseEvent, ConnectingEvent, ConnectionStatus, ErrorEvent,
    NoopHandler, OpenEvent, ReconnectingSocket, SocketBuilder, SocketHandler,
};

// Transport types
pub use transport::{
    CloseInfo, ConnectRequest, EventSink, MemoryTransport, MemoryTransportFactory, Transport,
    TransportEvent, TransportFactory, WebSocketFactory,
};
