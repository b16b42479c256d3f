//! Notifications delivered to socket handlers.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::transport::CloseInfo;

use super::CloseCause;

// ============================================================================
// Events
// ============================================================================

/// A connect attempt started, or a retry was scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectingEvent {
    /// Failed attempts in the current episode so far.
    pub attempt: u32,
    /// `true` for anything after the first attempt of an episode.
    pub is_reconnect: bool,
    /// Delay until the next attempt, when emitted after a closure.
    pub retry_in: Option<Duration>,
    /// Details of the closure that triggered the retry.
    pub close: Option<CloseInfo>,
}

/// The active transport completed its handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
    /// `true` if this open ended a reconnect episode.
    pub is_reconnect: bool,
    /// Sub-protocol selected by the server.
    pub protocol: Option<String>,
}

/// The socket reported a closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Why the attempt ended.
    pub cause: CloseCause,
    /// Transport close details, when available.
    pub info: Option<CloseInfo>,
}

impl CloseEvent {
    /// Returns `true` if the socket will not reconnect on its own.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.cause.is_terminal()
    }
}

/// The transport reported an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Description of the error.
    pub message: String,
}

// ============================================================================
// Notice
// ============================================================================

/// A notification queued while the state lock is held.
#[derive(Debug, Clone)]
pub(crate) enum Notice {
    Connecting(ConnectingEvent),
    Open(OpenEvent),
    Close(CloseEvent),
    Error(ErrorEvent),
}
