//! Connection configuration.
//!
//! Provides a type-safe interface for the reconnect, timeout and
//! sub-protocol settings of a [`ReconnectingSocket`](crate::ReconnectingSocket).
//! Every instance starts from the defaults below and overrides only what it
//! needs.
//!
//! | Option | Default |
//! |--------|---------|
//! | `debug` | `false` |
//! | `automaticOpen` | `true` |
//! | `reconnectInterval` | 1000 ms |
//! | `maxReconnectInterval` | 30000 ms |
//! | `reconnectDecay` | 1.5 |
//! | `timeoutInterval` | 2000 ms |
//! | `maxReconnectAttempts` | unlimited |
//! | `protocols` | none |
//! | `binaryType` | `blob` |
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use reconnecting_socket::ConnectionConfig;
//!
//! let config = ConnectionConfig::new()
//!     .with_reconnect_interval(Duration::from_millis(500))
//!     .with_max_reconnect_attempts(5)
//!     .with_protocol("chat.v1");
//!
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay before the first reconnect attempt.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);

/// Default ceiling for the reconnect delay.
pub const DEFAULT_MAX_RECONNECT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default multiplicative growth of the reconnect delay.
pub const DEFAULT_RECONNECT_DECAY: f64 = 1.5;

/// Default time allowed for one connect attempt.
pub const DEFAULT_TIMEOUT_INTERVAL: Duration = Duration::from_millis(2000);

// ============================================================================
// BinaryType
// ============================================================================

/// How binary frames should be surfaced by the transport.
///
/// This is a hint forwarded with every connect request. Transports that have
/// a single binary representation may ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryType {
    /// Opaque byte blob.
    #[default]
    Blob,
    /// Contiguous byte buffer.
    ArrayBuffer,
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Reconnect, timeout and sub-protocol configuration.
///
/// Serializes with the camelCase option names used by browser-side
/// reconnecting sockets, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Emit lifecycle diagnostics at `debug` level instead of `trace`.
    pub debug: bool,

    /// Start the first connect attempt when the socket is built.
    pub automatic_open: bool,

    /// Delay before the first reconnect attempt.
    #[serde(with = "millis")]
    pub reconnect_interval: Duration,

    /// Upper bound for the reconnect delay.
    #[serde(with = "millis")]
    pub max_reconnect_interval: Duration,

    /// Growth factor applied to the delay after every failed attempt.
    pub reconnect_decay: f64,

    /// Time allowed for a connect attempt before it is aborted.
    #[serde(with = "millis")]
    pub timeout_interval: Duration,

    /// Maximum number of consecutive failed attempts; unlimited if `None`.
    pub max_reconnect_attempts: Option<u32>,

    /// Sub-protocols offered on every connect attempt, in preference order.
    pub protocols: Vec<String>,

    /// Binary frame representation hint.
    pub binary_type: BinaryType,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            debug: false,
            automatic_open: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_interval: DEFAULT_MAX_RECONNECT_INTERVAL,
            reconnect_decay: DEFAULT_RECONNECT_DECAY,
            timeout_interval: DEFAULT_TIMEOUT_INTERVAL,
            max_reconnect_attempts: None,
            protocols: Vec::new(),
            binary_type: BinaryType::Blob,
        }
    }

    /// Loads a configuration from a JSON document.
    ///
    /// Missing keys keep their defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document cannot be parsed
    /// - [`Error::Config`] if the merged configuration is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionConfig {
    /// Enables diagnostic logging.
    #[inline]
    #[must_use]
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Sets whether building the socket starts the first attempt.
    #[inline]
    #[must_use]
    pub fn with_automatic_open(mut self, automatic_open: bool) -> Self {
        self.automatic_open = automatic_open;
        self
    }

    /// Sets the initial reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the reconnect delay ceiling.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_interval(mut self, interval: Duration) -> Self {
        self.max_reconnect_interval = interval;
        self
    }

    /// Sets the reconnect delay growth factor.
    #[inline]
    #[must_use]
    pub fn with_reconnect_decay(mut self, decay: f64) -> Self {
        self.reconnect_decay = decay;
        self
    }

    /// Sets the connect attempt timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout_interval(mut self, timeout: Duration) -> Self {
        self.timeout_interval = timeout;
        self
    }

    /// Caps the number of consecutive failed attempts.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Adds an offered sub-protocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Adds multiple offered sub-protocols.
    #[inline]
    #[must_use]
    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.protocols.extend(protocols.into_iter().map(Into::into));
        self
    }

    /// Sets the binary frame representation hint.
    #[inline]
    #[must_use]
    pub fn with_binary_type(mut self, binary_type: BinaryType) -> Self {
        self.binary_type = binary_type;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an interval is zero, the ceiling is below
    /// the initial delay, or the decay is not a finite number of at least 1.
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval.is_zero() {
            return Err(Error::config("reconnectInterval must be greater than zero"));
        }

        if self.max_reconnect_interval < self.reconnect_interval {
            return Err(Error::config(format!(
                "maxReconnectInterval ({}ms) must not be below reconnectInterval ({}ms)",
                self.max_reconnect_interval.as_millis(),
                self.reconnect_interval.as_millis()
            )));
        }

        if !self.reconnect_decay.is_finite() || self.reconnect_decay < 1.0 {
            return Err(Error::config(format!(
                "reconnectDecay must be a finite number >= 1.0, got {}",
                self.reconnect_decay
            )));
        }

        if self.timeout_interval.is_zero() {
            return Err(Error::config("timeoutInterval must be greater than zero"));
        }

        if let Some(protocol) = self.protocols.iter().find(|p| p.trim().is_empty()) {
            return Err(Error::config(format!(
                "sub-protocol names must not be blank, got {protocol:?}"
            )));
        }

        Ok(())
    }

    /// Returns `true` if reconnect attempts are capped.
    #[inline]
    #[must_use]
    pub const fn has_attempt_limit(&self) -> bool {
        self.max_reconnect_attempts.is_some()
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
