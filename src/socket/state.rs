//! Lifecycle status and the controller's private state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::task::JoinHandle;

use crate::identifiers::AttemptId;
use crate::transport::Transport;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Lifecycle status as presented to callers.
///
/// Managed by the socket rather than the transport, so that it stays
/// `Connecting` across a whole reconnect episode. A socket built without
/// automatic open reports `Closed` until its first `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// An attempt is in progress or a retry is scheduled.
    Connecting,
    /// The active transport completed its handshake.
    Open,
    /// A forced close was requested and is in progress.
    Closing,
    /// Idle or terminally closed.
    Closed,
}

impl ConnectionStatus {
    /// Returns the name used by browser sockets for this state.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CloseCause
// ============================================================================

/// Why an attempt ended.
///
/// Recorded on the attempt by whoever initiates the closure and read by the
/// close handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCause {
    /// The transport closed on its own.
    Remote,
    /// The connect timeout expired before the handshake completed.
    Timeout,
    /// The caller closed the socket.
    Forced,
    /// The caller asked for a fresh transport.
    Refresh,
    /// The reconnect attempt limit was reached.
    AttemptsExhausted,
}

impl CloseCause {
    /// Returns `true` if no further attempt follows this closure.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Forced | Self::AttemptsExhausted)
    }

    /// Returns `true` if callers see a close notification for this cause.
    ///
    /// Only the first failure of a reconnect episode is visible; see the
    /// close handler for the attempt-level rule.
    #[inline]
    #[must_use]
    pub const fn is_reported(self) -> bool {
        !matches!(self, Self::Timeout | Self::Refresh)
    }
}

// ============================================================================
// Internal State
// ============================================================================

/// The one transport the socket currently owns.
pub(crate) struct ActiveAttempt {
    pub(crate) id: AttemptId,
    pub(crate) transport: Box<dyn Transport>,
    /// Started by the retry timer and not yet opened.
    pub(crate) is_reconnect: bool,
    pub(crate) opened: bool,
    /// Set when the socket itself initiated the closure.
    pub(crate) close_cause: Option<CloseCause>,
}

impl ActiveAttempt {
    pub(crate) fn new(id: AttemptId, transport: Box<dyn Transport>, is_reconnect: bool) -> Self {
        Self {
            id,
            transport,
            is_reconnect,
            opened: false,
            close_cause: None,
        }
    }

    /// Records the closure cause unless one is already set, then closes.
    pub(crate) fn close(&mut self, cause: CloseCause, code: u16, reason: &str) {
        self.close_cause.get_or_insert(cause);
        self.transport.close(code, reason);
    }
}

/// Mutable lifecycle state, owned by one socket.
pub(crate) struct ConnectionState {
    pub(crate) status: ConnectionStatus,
    pub(crate) active: Option<ActiveAttempt>,
    /// Failed attempts in the current episode; reset on open.
    pub(crate) reconnect_attempts: u32,
    pub(crate) forced_close: bool,
    pub(crate) next_attempt: AttemptId,
    /// Attempt whose transport is being created outside the lock.
    pub(crate) pending: Option<AttemptId>,
    /// Sub-protocol negotiated by the last open.
    pub(crate) protocol: Option<String>,
    pub(crate) connect_timer: Option<JoinHandle<()>>,
    pub(crate) reconnect_timer: Option<JoinHandle<()>>,
}

impl ConnectionState {
    pub(crate) fn new() -> Self {
        Self {
            status: ConnectionStatus::Closed,
            active: None,
            reconnect_attempts: 0,
            forced_close: false,
            next_attempt: AttemptId::new(1),
            pending: None,
            protocol: None,
            connect_timer: None,
            reconnect_timer: None,
        }
    }

    /// Returns the active attempt if it has the given id.
    pub(crate) fn attempt_mut(&mut self, id: AttemptId) -> Option<&mut ActiveAttempt> {
        self.active.as_mut().filter(|active| active.id == id)
    }

    /// Cancels the connect-timeout timer, if armed.
    pub(crate) fn cancel_connect_timer(&mut self) {
        if let Some(timer) = self.connect_timer.take() {
            timer.abort();
        }
    }

    /// Cancels the reconnect timer, if armed.
    pub(crate) fn cancel_reconnect_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
