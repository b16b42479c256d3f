//! The reconnecting socket.
//!
//! # Driver Task
//!
//! Every socket spawns one tokio task that owns the receive side of its
//! signal channel. Transport events, connect-timeout expiry and retry timers
//! all arrive there, so every lifecycle transition is applied by one logical
//! event loop. Caller operations (`connect`, `send`, `close`, ...) touch the
//! same state under a short lock and return immediately.
//!
//! Handlers are always invoked after the lock is released.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::identifiers::AttemptId;
use crate::protocol::{Frame, Payload};
use crate::transport::{
    CLOSE_GOING_AWAY, CLOSE_NORMAL, CloseInfo, ConnectRequest, EventSink, Transport,
    TransportEvent, TransportFactory,
};

use super::event::Notice;
use super::state::{ActiveAttempt, ConnectionState};
use super::{
    Backoff, CloseCause, CloseEvent, ConnectingEvent, ConnectionStatus, ErrorEvent, OpenEvent,
    SocketBuilder, SocketHandler,
};

// ============================================================================
// Macros
// ============================================================================

/// Lifecycle diagnostics: `debug` when the socket is in debug mode, else `trace`.
macro_rules! diag {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::debug!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    };
}

// ============================================================================
// Signal
// ============================================================================

/// Input to the driver task.
#[derive(Debug)]
pub(crate) enum Signal {
    /// A transport reported an event.
    Transport {
        attempt: AttemptId,
        event: TransportEvent,
    },
    /// The connect timeout of an attempt expired.
    ConnectTimeout(AttemptId),
    /// The reconnect delay elapsed.
    ReconnectDue,
    /// A transport created outside the lock was installed or abandoned.
    AttemptReady(AttemptId),
}

// ============================================================================
// ReconnectingSocket
// ============================================================================

/// A WebSocket-like connection that reconnects itself.
///
/// Owns at most one transport at a time. When it is lost, the socket stays
/// [`ConnectionStatus::Connecting`] and retries with exponential backoff until
/// it opens again, the attempt limit is hit, or the caller closes it.
///
/// # Thread Safety
///
/// `ReconnectingSocket` is `Send + Sync` and cheap to clone; clones share the
/// same connection. The driver task stops when the last clone is dropped.
///
/// # Example
///
/// ```ignore
/// use reconnecting_socket::{Callbacks, Envelope, ReconnectingSocket};
///
/// let socket = ReconnectingSocket::builder("ws://127.0.0.1:9001/feed")
///     .handler(Callbacks::new().with_message_logic(|message| {
///         println!("{message}");
///         Ok(())
///     }))
///     .build()?;
///
/// socket.send(Envelope::new("subscribe"))?;
/// ```
#[derive(Clone)]
pub struct ReconnectingSocket {
    shared: Arc<Shared>,
}

/// State shared between handles and the driver task.
struct Shared {
    url: Url,
    config: ConnectionConfig,
    backoff: Backoff,
    factory: Arc<dyn TransportFactory>,
    handler: RwLock<Arc<dyn SocketHandler>>,
    state: Mutex<ConnectionState>,
    runtime: Handle,
    signal_tx: mpsc::UnboundedSender<Signal>,
    status_tx: watch::Sender<ConnectionStatus>,
    /// Dropped with the last handle; stops the driver task.
    _shutdown_tx: oneshot::Sender<()>,
}

// ============================================================================
// Construction
// ============================================================================

impl ReconnectingSocket {
    /// Creates a builder for a socket connecting to `url`.
    #[inline]
    #[must_use]
    pub fn builder(url: impl Into<String>) -> SocketBuilder {
        SocketBuilder::new(url)
    }

    /// Creates a socket with the given configuration and default transport.
    ///
    /// # Errors
    ///
    /// Same as [`SocketBuilder::build`].
    pub fn new(url: impl Into<String>, config: ConnectionConfig) -> Result<Self> {
        SocketBuilder::new(url).config(config).build()
    }

    pub(crate) fn spawn(
        url: Url,
        config: ConnectionConfig,
        factory: Arc<dyn TransportFactory>,
        handler: Arc<dyn SocketHandler>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("a socket must be created inside a Tokio runtime"))?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (status_tx, _) = watch::channel(ConnectionStatus::Closed);

        let shared = Arc::new(Shared {
            url,
            backoff: Backoff::from_config(&config),
            config,
            factory,
            handler: RwLock::new(handler),
            state: Mutex::new(ConnectionState::new()),
            runtime,
            signal_tx,
            status_tx,
            _shutdown_tx: shutdown_tx,
        });

        shared.runtime.spawn(Self::run_driver(
            Arc::downgrade(&shared),
            signal_rx,
            shutdown_rx,
        ));

        let socket = Self { shared };
        diag!(socket.shared.config.debug, url = %socket.shared.url, "Socket created");

        if socket.shared.config.automatic_open {
            socket.connect(false);
        }

        Ok(socket)
    }

    /// Driver loop that applies signals one at a time.
    async fn run_driver(
        shared: Weak<Shared>,
        mut signal_rx: mpsc::UnboundedReceiver<Signal>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        // Transport events that arrived while their attempt was being created.
        let mut deferred = Vec::new();

        loop {
            tokio::select! {
                signal = signal_rx.recv() => {
                    let Some(signal) = signal else { break };
                    let Some(shared) = shared.upgrade() else { break };
                    shared.dispatch(signal, &mut deferred);
                }

                _ = &mut shutdown_rx => break,
            }
        }

        debug!("Socket driver terminated");
    }
}

// ============================================================================
// Operations
// ============================================================================

impl ReconnectingSocket {
    /// Starts a connect attempt.
    ///
    /// `is_reconnect = false` begins a new episode: it clears a previous
    /// forced close, resets the attempt count and cancels a pending retry.
    /// Does nothing while an attempt is already live.
    pub fn connect(&self, is_reconnect: bool) {
        let notice = self.shared.start_attempt(is_reconnect);
        self.shared.notify(notice);
    }

    /// Sends a payload over the open transport.
    ///
    /// Nothing is queued: the payload is either handed to the transport now
    /// or rejected.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPayloadKind`] if the payload is neither text nor an
    ///   envelope
    /// - [`Error::NotConnected`] if the socket is not open, or its transport
    ///   is already closing
    /// - Any error the transport reports when accepting the frame
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        let frame = payload.into().into_frame()?;

        let state = self.shared.state.lock();
        match &state.active {
            Some(active)
                if active.opened
                    && active.close_cause.is_none()
                    && state.status == ConnectionStatus::Open =>
            {
                trace!(attempt = %active.id, kind = frame.kind(), len = frame.len(), "Sending frame");
                active.transport.send(frame)
            }
            _ => Err(Error::NotConnected),
        }
    }

    /// Sends raw bytes as a binary frame.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Payload::Binary(bytes.into()))
    }

    /// Closes the socket with a normal close code.
    ///
    /// Returns `false` and does nothing if no transport is active.
    pub fn close(&self) -> bool {
        self.close_with(CLOSE_NORMAL, "")
    }

    /// Closes the socket with an explicit close code and reason.
    ///
    /// Once accepted, no further attempt is made until [`connect`](Self::connect)
    /// is called again. Returns `false` and does nothing if no transport is
    /// active.
    pub fn close_with(&self, code: u16, reason: &str) -> bool {
        let mut state = self.shared.state.lock();
        let Some(active) = state.active.as_mut() else {
            return false;
        };

        diag!(self.shared.config.debug, attempt = %active.id, code, "Forced close requested");
        active.close(CloseCause::Forced, code, reason);

        state.forced_close = true;
        state.cancel_reconnect_timer();
        self.shared.set_status(&mut state, ConnectionStatus::Closing);
        true
    }

    /// Replaces the active transport with a fresh one.
    ///
    /// The current transport is closed and the socket reconnects as after a
    /// loss, without a close notification. The status is `Connecting` from
    /// the moment of the call. Returns `false` if no transport is active.
    pub fn refresh(&self) -> bool {
        let mut state = self.shared.state.lock();
        let Some(active) = state.active.as_mut() else {
            return false;
        };

        diag!(self.shared.config.debug, attempt = %active.id, "Refresh requested");
        active.close(CloseCause::Refresh, CLOSE_NORMAL, "refresh");

        if !state.forced_close {
            self.shared.set_status(&mut state, ConnectionStatus::Connecting);
        }
        true
    }

    /// Stops the socket whatever its state.
    ///
    /// Cancels pending timers and force-closes the active transport, if any.
    /// Unlike [`close`](Self::close), this also stops a reconnect episode that
    /// is waiting for its next attempt.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        state.forced_close = true;
        state.cancel_connect_timer();
        state.cancel_reconnect_timer();

        match state.active.as_mut() {
            Some(active) => {
                active.close(CloseCause::Forced, CLOSE_GOING_AWAY, "shutdown");
                self.shared.set_status(&mut state, ConnectionStatus::Closing);
            }
            None => self.shared.set_status(&mut state, ConnectionStatus::Closed),
        }

        diag!(self.shared.config.debug, "Socket shut down");
    }

    /// Runs the message pipeline on a frame and returns its outcome.
    ///
    /// # Errors
    ///
    /// Whatever the handler's [`on_message`](SocketHandler::on_message) returns.
    pub fn dispatch_message(&self, frame: &Frame) -> Result<()> {
        self.shared.handler().on_message(frame)
    }

    /// Replaces the notification handler.
    pub fn set_handler(&self, handler: impl SocketHandler + 'static) {
        *self.shared.handler.write() = Arc::new(handler);
    }
}

// ============================================================================
// Introspection
// ============================================================================

impl ReconnectingSocket {
    /// Returns the current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    /// Returns a receiver that observes status changes.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Returns the sub-protocol selected by the server on the last open.
    #[must_use]
    pub fn protocol(&self) -> Option<String> {
        self.shared.state.lock().protocol.clone()
    }

    /// Returns the number of failed attempts in the current episode.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.state.lock().reconnect_attempts
    }

    /// Returns `true` if a transport is currently active.
    #[must_use]
    pub fn has_transport(&self) -> bool {
        self.shared.state.lock().active.is_some()
    }

    /// Returns the id of the active attempt, if any.
    #[must_use]
    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.shared.state.lock().active.as_ref().map(|active| active.id)
    }

    /// Returns `true` if the caller closed the socket.
    #[must_use]
    pub fn is_forced_closed(&self) -> bool {
        self.shared.state.lock().forced_close
    }
}

// ============================================================================
// State Machine
// ============================================================================

impl Shared {
    fn handler(&self) -> Arc<dyn SocketHandler> {
        Arc::clone(&self.handler.read())
    }

    fn set_status(&self, state: &mut ConnectionState, status: ConnectionStatus) {
        if state.status != status {
            diag!(self.config.debug, from = %state.status, to = %status, "Status changed");
            state.status = status;
            self.status_tx.send_replace(status);
        }
    }

    /// Spawns a timer task that posts `signal` after `delay`.
    fn arm(&self, delay: Duration, signal: Signal) -> JoinHandle<()> {
        let tx = self.signal_tx.clone();
        self.runtime.spawn(async move {
            sleep(delay).await;
            let _ = tx.send(signal);
        })
    }

    /// Starts an attempt in three steps: reserve it under the lock, create
    /// the transport without the lock, then install it under the lock again.
    ///
    /// The factory may therefore call back into the socket.
    fn start_attempt(&self, is_reconnect: bool) -> Option<Notice> {
        let request = {
            let mut state = self.state.lock();
            if let Some(active) = &state.active {
                debug!(attempt = %active.id, "Connect ignored, an attempt is already live");
                return None;
            }
            if let Some(pending) = state.pending {
                debug!(attempt = %pending, "Connect ignored, a transport is being created");
                return None;
            }

            if is_reconnect {
                if state.forced_close {
                    trace!("Reconnect skipped after forced close");
                    return None;
                }
            } else {
                state.forced_close = false;
                state.reconnect_attempts = 0;
            }
            state.cancel_reconnect_timer();

            let id = state.next_attempt;
            state.next_attempt = id.next();
            state.pending = Some(id);

            ConnectRequest {
                attempt: id,
                url: self.url.clone(),
                protocols: self.config.protocols.clone(),
                binary_type: self.config.binary_type,
            }
        };

        let id = request.attempt;
        let events = EventSink::new(id, self.signal_tx.clone());
        let transport = {
            let _runtime = self.runtime.enter();
            self.factory.create(request, events)
        };

        let notice = self.install_attempt(id, transport, is_reconnect);
        let _ = self.signal_tx.send(Signal::AttemptReady(id));
        notice
    }

    fn install_attempt(
        &self,
        id: AttemptId,
        transport: Box<dyn Transport>,
        is_reconnect: bool,
    ) -> Option<Notice> {
        let mut state = self.state.lock();
        state.pending = None;

        // `shutdown` ran while the factory was working.
        if state.forced_close {
            drop(state);
            debug!(attempt = %id, "Socket shut down during connect, discarding transport");
            transport.close(CLOSE_GOING_AWAY, "shutdown");
            return None;
        }

        state.active = Some(ActiveAttempt::new(id, transport, is_reconnect));
        self.set_status(&mut state, ConnectionStatus::Connecting);

        state.cancel_connect_timer();
        let timer = self.arm(self.config.timeout_interval, Signal::ConnectTimeout(id));
        state.connect_timer = Some(timer);

        diag!(
            self.config.debug,
            attempt = %id,
            is_reconnect,
            failed = state.reconnect_attempts,
            url = %self.url,
            "Connect attempt started"
        );

        Some(Notice::Connecting(ConnectingEvent {
            attempt: state.reconnect_attempts,
            is_reconnect,
            retry_in: None,
            close: None,
        }))
    }

    /// Holds back transport events of an attempt that is not installed yet,
    /// and replays them in order once it is.
    fn dispatch(&self, signal: Signal, deferred: &mut Vec<Signal>) {
        match signal {
            Signal::AttemptReady(attempt) => {
                if !deferred.is_empty() {
                    trace!(%attempt, count = deferred.len(), "Replaying deferred events");
                }
                for signal in std::mem::take(deferred) {
                    self.handle_signal(signal);
                }
            }

            Signal::Transport { attempt, .. } => {
                let pending = self.state.lock().pending;
                if deferred.is_empty() && pending != Some(attempt) {
                    self.handle_signal(signal);
                } else {
                    trace!(%attempt, "Deferring event until the transport is installed");
                    deferred.push(signal);
                }
            }

            signal => self.handle_signal(signal),
        }
    }

    fn handle_signal(&self, signal: Signal) {
        match signal {
            Signal::Transport { attempt, event } => self.on_transport_event(attempt, event),
            Signal::ConnectTimeout(attempt) => self.on_connect_timeout(attempt),
            Signal::ReconnectDue => self.on_reconnect_due(),
            Signal::AttemptReady(_) => {}
        }
    }

    fn on_transport_event(&self, attempt: AttemptId, event: TransportEvent) {
        match event {
            TransportEvent::Open { protocol } => {
                let notice = self.on_open(attempt, protocol);
                self.notify(notice);
            }

            TransportEvent::Message(frame) => {
                if self.state.lock().attempt_mut(attempt).is_none() {
                    trace!(%attempt, "Dropping message from stale attempt");
                    return;
                }
                let handler = self.handler();
                if let Err(e) = handler.on_message(&frame) {
                    handler.on_message_error(e);
                }
            }

            TransportEvent::Error { message } => {
                if self.state.lock().attempt_mut(attempt).is_none() {
                    trace!(%attempt, "Dropping error from stale attempt");
                    return;
                }
                warn!(%attempt, error = %message, "Transport error");
                self.notify(Some(Notice::Error(ErrorEvent { message })));
            }

            TransportEvent::Closed(info) => {
                let notices = self.on_closed(attempt, info);
                for notice in notices {
                    self.notify(Some(notice));
                }
            }
        }
    }

    fn on_open(&self, attempt: AttemptId, protocol: Option<String>) -> Option<Notice> {
        let mut state = self.state.lock();
        let Some(active) = state.attempt_mut(attempt) else {
            trace!(%attempt, "Ignoring open from stale attempt");
            return None;
        };
        if active.opened || active.close_cause.is_some() {
            trace!(%attempt, "Ignoring open of a closing attempt");
            return None;
        }

        active.opened = true;
        let is_reconnect = std::mem::take(&mut active.is_reconnect);

        state.cancel_connect_timer();
        state.reconnect_attempts = 0;
        state.protocol.clone_from(&protocol);
        self.set_status(&mut state, ConnectionStatus::Open);

        diag!(self.config.debug, %attempt, is_reconnect, ?protocol, "Connection open");

        Some(Notice::Open(OpenEvent {
            is_reconnect,
            protocol,
        }))
    }

    fn on_closed(&self, attempt: AttemptId, info: CloseInfo) -> Vec<Notice> {
        let mut state = self.state.lock();
        let Some(active) = state.active.take_if(|active| active.id == attempt) else {
            trace!(%attempt, "Ignoring close from stale attempt");
            return Vec::new();
        };
        state.cancel_connect_timer();

        let cause = if state.forced_close {
            CloseCause::Forced
        } else {
            active.close_cause.unwrap_or(CloseCause::Remote)
        };

        if cause == CloseCause::Forced {
            self.set_status(&mut state, ConnectionStatus::Closed);
            diag!(self.config.debug, %attempt, code = info.code, "Connection closed by caller");
            return vec![Notice::Close(CloseEvent {
                cause,
                info: Some(info),
            })];
        }

        state.reconnect_attempts = state.reconnect_attempts.saturating_add(1);
        let failed = state.reconnect_attempts;

        if self
            .config
            .max_reconnect_attempts
            .is_some_and(|limit| failed > limit)
        {
            state.cancel_reconnect_timer();
            self.set_status(&mut state, ConnectionStatus::Closed);
            warn!(%attempt, failed, "Reconnect attempts exhausted");
            return vec![Notice::Close(CloseEvent {
                cause: CloseCause::AttemptsExhausted,
                info: Some(info),
            })];
        }

        self.set_status(&mut state, ConnectionStatus::Connecting);

        let delay = self.backoff.delay(failed);
        state.cancel_reconnect_timer();
        state.reconnect_timer = Some(self.arm(delay, Signal::ReconnectDue));

        diag!(
            self.config.debug,
            %attempt,
            ?cause,
            code = info.code,
            failed,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Connection lost, retry scheduled"
        );

        let mut notices = vec![Notice::Connecting(ConnectingEvent {
            attempt: failed,
            is_reconnect: true,
            retry_in: Some(delay),
            close: Some(info.clone()),
        })];

        // Only the first failure of an episode is reported as a close.
        if !active.is_reconnect && cause.is_reported() {
            notices.push(Notice::Close(CloseEvent {
                cause,
                info: Some(info),
            }));
        }

        notices
    }

    fn on_connect_timeout(&self, attempt: AttemptId) {
        let mut state = self.state.lock();
        let Some(active) = state.attempt_mut(attempt) else {
            return;
        };
        if active.opened {
            return;
        }

        warn!(
            %attempt,
            timeout_ms = u64::try_from(self.config.timeout_interval.as_millis()).unwrap_or(u64::MAX),
            "Connect attempt timed out"
        );
        active.close(CloseCause::Timeout, CLOSE_NORMAL, "connect timeout");
        state.connect_timer = None;
    }

    fn on_reconnect_due(&self) {
        {
            let mut state = self.state.lock();
            state.reconnect_timer = None;
            if state.forced_close || state.active.is_some() {
                return;
            }
        }
        let notice = self.start_attempt(true);
        self.notify(notice);
    }

    fn notify(&self, notice: Option<Notice>) {
        let Some(notice) = notice else { return };
        let handler = self.handler();

        match notice {
            Notice::Connecting(event) => handler.on_connecting(&event),
            Notice::Open(event) => handler.on_open(&event),
            Notice::Close(event) => handler.on_close(&event),
            Notice::Error(event) => handler.on_error(&event),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.cancel_connect_timer();
        state.cancel_reconnect_timer();

        if let Some(mut active) = state.active.take() {
            active.close(CloseCause::Forced, CLOSE_GOING_AWAY, "socket dropped");
        }
    }
}
