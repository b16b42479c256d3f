//! WebSocket transport over tokio-tungstenite.
//!
//! Each attempt spawns one tokio task that owns the socket.
//!
//! # Event Loop
//!
//! The task handles:
//!
//! - The client handshake, abortable by `close`
//! - Incoming frames from the server
//! - Outgoing frames and close requests from the socket
//! - Reporting exactly one `Closed` event when it exits

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::Frame;

use super::{
    CLOSE_GOING_AWAY, CLOSE_NO_STATUS, CloseInfo, ConnectRequest, EventSink, Transport,
    TransportEvent, TransportFactory,
};

// ============================================================================
// Constants
// ============================================================================

/// Time allowed for the server to answer our close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// WebSocketFactory
// ============================================================================

/// Default transport factory: one WebSocket client connection per attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl WebSocketFactory {
    /// Creates the factory.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for WebSocketFactory {
    fn create(&self, request: ConnectRequest, events: EventSink) -> Box<dyn Transport> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_transport(request, command_rx, events));

        Box::new(WebSocketTransport { command_tx })
    }
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Commands for the transport task.
enum TransportCommand {
    /// Write a frame.
    Send(Frame),
    /// Start the closing handshake.
    Close { code: u16, reason: String },
}

/// Handle to a running transport task.
struct WebSocketTransport {
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl Transport for WebSocketTransport {
    fn send(&self, frame: Frame) -> Result<()> {
        self.command_tx
            .send(TransportCommand::Send(frame))
            .map_err(|_| Error::connection("WebSocket transport has terminated"))
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.command_tx.send(TransportCommand::Close {
            code,
            reason: reason.to_owned(),
        });
    }
}

// ============================================================================
// Transport Task
// ============================================================================

/// Runs one attempt from handshake to closure.
async fn run_transport(
    request: ConnectRequest,
    mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    events: EventSink,
) {
    let attempt = request.attempt;

    let client_request = match build_client_request(&request) {
        Ok(client_request) => client_request,
        Err(e) => {
            warn!(%attempt, error = %e, "Invalid handshake request");
            events.emit(TransportEvent::Error {
                message: e.to_string(),
            });
            events.emit(TransportEvent::Closed(CloseInfo::abnormal(e.to_string())));
            return;
        }
    };

    if events.is_detached() {
        debug!(%attempt, "Socket gone before connecting, skipping handshake");
        return;
    }

    debug!(%attempt, url = %request.url, "Connecting WebSocket");

    let handshake = connect_async(client_request);
    tokio::pin!(handshake);

    let (ws_stream, response) = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok(connected) => break connected,
                Err(e) => {
                    warn!(%attempt, error = %e, "WebSocket handshake failed");
                    events.emit(TransportEvent::Error { message: e.to_string() });
                    events.emit(TransportEvent::Closed(CloseInfo::abnormal(e.to_string())));
                    return;
                }
            },

            command = command_rx.recv() => match command {
                Some(TransportCommand::Send(frame)) => {
                    warn!(%attempt, kind = frame.kind(), "Dropping frame sent before handshake");
                }
                Some(TransportCommand::Close { .. }) | None => {
                    debug!(%attempt, "Handshake aborted");
                    events.emit(TransportEvent::Closed(CloseInfo::abnormal(
                        "closed before the handshake completed",
                    )));
                    return;
                }
            },
        }
    };

    let protocol = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    debug!(%attempt, ?protocol, "WebSocket open");
    let (mut ws_write, mut ws_read) = ws_stream.split();

    if !events.emit(TransportEvent::Open { protocol }) {
        debug!(%attempt, "Socket gone after handshake, closing");
        let _ = ws_write.close().await;
        return;
    }

    let close_timer = sleep(CLOSE_HANDSHAKE_TIMEOUT);
    tokio::pin!(close_timer);
    let mut requested_close: Option<CloseInfo> = None;

    let info = loop {
        tokio::select! {
            message = ws_read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Message(Frame::Text(text.as_str().to_owned())));
                }

                Some(Ok(Message::Binary(bytes))) => {
                    events.emit(TransportEvent::Message(Frame::Binary(bytes.to_vec())));
                }

                Some(Ok(Message::Close(frame))) => {
                    trace!(%attempt, ?frame, "Close frame received");
                    break frame.map_or_else(
                        || CloseInfo::new(CLOSE_NO_STATUS, "", true),
                        |frame| CloseInfo::new(u16::from(frame.code), frame.reason.as_str(), true),
                    );
                }

                Some(Err(e)) => {
                    warn!(%attempt, error = %e, "WebSocket error");
                    events.emit(TransportEvent::Error { message: e.to_string() });
                    break CloseInfo::abnormal(e.to_string());
                }

                None => {
                    debug!(%attempt, "WebSocket stream ended");
                    break requested_close
                        .take()
                        .unwrap_or_else(|| CloseInfo::abnormal("stream ended"));
                }

                // Ping, Pong and raw frames are handled by tungstenite
                Some(Ok(_)) => {}
            },

            command = command_rx.recv(), if requested_close.is_none() => match command {
                Some(TransportCommand::Send(frame)) => {
                    if let Err(e) = ws_write.send(into_message(frame)).await {
                        warn!(%attempt, error = %e, "Failed to send frame");
                        events.emit(TransportEvent::Error { message: e.to_string() });
                    }
                }

                Some(TransportCommand::Close { code, reason }) => {
                    debug!(%attempt, code, %reason, "Closing WebSocket");
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    let _ = ws_write.send(Message::Close(Some(frame))).await;
                    close_timer.as_mut().reset(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
                    requested_close = Some(CloseInfo::new(code, reason, true));
                }

                None => {
                    debug!(%attempt, "Transport handle dropped");
                    let _ = ws_write.close().await;
                    break CloseInfo::new(CLOSE_GOING_AWAY, "transport dropped", true);
                }
            },

            () = &mut close_timer, if requested_close.is_some() => {
                warn!(%attempt, "Server did not complete the closing handshake");
                let mut info = requested_close.take().unwrap_or_else(|| CloseInfo::abnormal(""));
                info.was_clean = false;
                break info;
            }
        }
    };

    events.emit(TransportEvent::Closed(info));
    trace!(%attempt, "Transport task terminated");
}

/// Builds the handshake request, offering sub-protocols when configured.
fn build_client_request(request: &ConnectRequest) -> Result<Request> {
    let mut client_request = request.url.as_str().into_client_request()?;

    if !request.protocols.is_empty() {
        let value = HeaderValue::from_str(&request.protocols.join(", "))
            .map_err(|e| Error::connection(format!("Invalid sub-protocol list: {e}")))?;
        client_request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(client_request)
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes.into()),
    }
}

// ============================================================================
// Tests
// ============================================================================
