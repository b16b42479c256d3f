//! In-process transport.
//!
//! [`MemoryTransportFactory`] hands out [`MemoryTransport`]s and keeps a
//! handle to each one, so test code can play the remote side: complete the
//! handshake, deliver frames, drop the connection, and inspect what the
//! socket sent.
//!
//! # Example
//!
//! ```ignore
//! let factory = MemoryTransportFactory::new();
//! let socket = ReconnectingSocket::builder("ws://example.invalid/")
//!     .transport_factory(factory.clone())
//!     .build()?;
//!
//! let transport = factory.last().expect("first attempt");
//! transport.open();
//! transport.receive(r#"{"status":"ready"}"#);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::Frame;

use super::{
    CLOSE_ABNORMAL, CloseInfo, ConnectRequest, EventSink, Transport, TransportEvent,
    TransportFactory,
};

// ============================================================================
// MemoryTransportFactory
// ============================================================================

/// Factory that records every transport it creates.
///
/// Cloning shares the record.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransportFactory {
    created: Arc<Mutex<Vec<MemoryTransport>>>,
}

impl MemoryTransportFactory {
    /// Creates an empty factory.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of transports created so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.created.lock().len()
    }

    /// Returns the transport created for the `index`-th attempt.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<MemoryTransport> {
        self.created.lock().get(index).cloned()
    }

    /// Returns the most recently created transport.
    #[must_use]
    pub fn last(&self) -> Option<MemoryTransport> {
        self.created.lock().last().cloned()
    }
}

impl TransportFactory for MemoryTransportFactory {
    fn create(&self, request: ConnectRequest, events: EventSink) -> Box<dyn Transport> {
        trace!(attempt = %request.attempt, url = %request.url, "Creating memory transport");

        let transport = MemoryTransport {
            request: Arc::new(request),
            events,
            shared: Arc::new(Mutex::new(MemoryState::default())),
        };

        self.created.lock().push(transport.clone());
        Box::new(transport)
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    sent: Vec<Frame>,
    close_requested: Option<(u16, String)>,
    closed: bool,
}

/// Scripted transport handle.
///
/// The socket holds one clone; test code holds others to act as the remote
/// peer.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    request: Arc<ConnectRequest>,
    events: EventSink,
    shared: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Returns the request this transport was created with.
    #[inline]
    #[must_use]
    pub fn request(&self) -> &ConnectRequest {
        &self.request
    }

    /// Completes the handshake without a sub-protocol.
    pub fn open(&self) {
        self.open_with_protocol(None);
    }

    /// Completes the handshake, reporting the selected sub-protocol.
    pub fn open_with_protocol(&self, protocol: Option<&str>) {
        self.events.emit(TransportEvent::Open {
            protocol: protocol.map(str::to_owned),
        });
    }

    /// Delivers a frame from the remote peer.
    pub fn receive(&self, frame: impl Into<Frame>) {
        self.events.emit(TransportEvent::Message(frame.into()));
    }

    /// Reports a transport error without closing.
    pub fn fail(&self, message: impl Into<String>) {
        self.events.emit(TransportEvent::Error {
            message: message.into(),
        });
    }

    /// Closes from the remote side with a clean handshake.
    pub fn close_remote(&self, code: u16, reason: &str) {
        self.finish(CloseInfo::new(code, reason, true));
    }

    /// Drops the connection without a close frame.
    pub fn drop_connection(&self) {
        self.finish(CloseInfo::new(CLOSE_ABNORMAL, "connection dropped", false));
    }

    /// Returns the frames sent by the socket.
    #[must_use]
    pub fn sent(&self) -> Vec<Frame> {
        self.shared.lock().sent.clone()
    }

    /// Returns the close code and reason requested by the socket, if any.
    #[must_use]
    pub fn close_requested(&self) -> Option<(u16, String)> {
        self.shared.lock().close_requested.clone()
    }

    /// Returns `true` once a `Closed` event has been reported.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    fn finish(&self, info: CloseInfo) {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.events.emit(TransportEvent::Closed(info));
    }
}

impl Transport for MemoryTransport {
    fn send(&self, frame: Frame) -> Result<()> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(Error::connection("memory transport is closed"));
        }
        state.sent.push(frame);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        self.shared.lock().close_requested = Some((code, reason.to_owned()));
        self.finish(CloseInfo::new(code, reason, true));
    }
}

// ============================================================================
// Tests
// ============================================================================
