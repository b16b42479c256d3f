//! Error types for the reconnecting socket.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Validation and decode failures are returned synchronously as [`Result<T>`].
//! Connectivity loss is never an error: it drives the reconnect state machine
//! and is observable only through handler notifications.
//!
//! ```ignore
//! use reconnecting_socket::{Error, Result};
//!
//! fn announce(socket: &ReconnectingSocket) -> Result<()> {
//!     match socket.send("hello") {
//!         Err(Error::NotConnected) => Ok(()), // retry after the next open
//!         other => other,
//!     }
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Decode | [`Error::MalformedPayload`], [`Error::UnsupportedPayloadType`] |
//! | Send | [`Error::InvalidPayloadKind`], [`Error::NotConnected`] |
//! | Programmer | [`Error::UnimplementedHandler`] |
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Connection | [`Error::Connection`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// Inbound text frame was not valid JSON.
    #[error("Malformed payload: {source}")]
    MalformedPayload {
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },

    /// Inbound frame was not a text frame.
    #[error("Unsupported payload type: {kind}")]
    UnsupportedPayloadType {
        /// Kind of frame that was received.
        kind: String,
    },

    // ========================================================================
    // Send Errors
    // ========================================================================
    /// Outbound payload was neither text nor a structured envelope.
    #[error("Invalid payload kind: {kind} (expected text or {{status, data}} envelope)")]
    InvalidPayloadKind {
        /// Kind of value that was supplied.
        kind: String,
    },

    /// No open transport is available.
    ///
    /// Returned by send operations between attempts. Nothing is queued.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Programmer Errors
    // ========================================================================
    /// A handler hook that must be overridden was invoked with its default body.
    #[error("Handler hook `{hook}` is not implemented")]
    UnimplementedHandler {
        /// Name of the hook.
        hook: &'static str,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL could not be parsed or uses an unsupported scheme.
    #[error("Invalid URL `{url}`: {message}")]
    InvalidUrl {
        /// The URL as supplied.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport-level failure while handling a frame.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a malformed payload error.
    #[inline]
    pub fn malformed_payload(source: serde_json::Error) -> Self {
        Self::MalformedPayload { source }
    }

    /// Creates an unsupported payload type error.
    #[inline]
    pub fn unsupported_payload_type(kind: impl Into<String>) -> Self {
        Self::UnsupportedPayloadType { kind: kind.into() }
    }

    /// Creates an invalid payload kind error.
    #[inline]
    pub fn invalid_payload_kind(kind: impl Into<String>) -> Self {
        Self::InvalidPayloadKind { kind: kind.into() }
    }

    /// Creates an unimplemented handler error.
    #[inline]
    pub fn unimplemented_handler(hook: &'static str) -> Self {
        Self::UnimplementedHandler { hook }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came from decoding an inbound frame.
    #[inline]
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. } | Self::UnsupportedPayloadType { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Connection { .. } | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error signals a wiring mistake in calling code.
    ///
    /// These never succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::UnimplementedHandler { .. }
                | Self::InvalidPayloadKind { .. }
                | Self::Config { .. }
                | Self::InvalidUrl { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
