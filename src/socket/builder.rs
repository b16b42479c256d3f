//! Builder pattern for socket configuration.
//!
//! Provides a fluent API for configuring and creating
//! [`ReconnectingSocket`] instances.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use reconnecting_socket::ReconnectingSocket;
//!
//! let socket = ReconnectingSocket::builder("wss://feeds.example.com/v1")
//!     .protocol("feed.v1")
//!     .timeout_interval(Duration::from_secs(5))
//!     .max_reconnect_attempts(10)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::{BinaryType, ConnectionConfig};
use crate::error::{Error, Result};
use crate::transport::{TransportFactory, WebSocketFactory};

use super::{NoopHandler, ReconnectingSocket, SocketHandler};

// ============================================================================
// SocketBuilder
// ============================================================================

/// Builder for configuring a [`ReconnectingSocket`].
///
/// Use [`ReconnectingSocket::builder()`] to create a new builder.
pub struct SocketBuilder {
    /// Endpoint URL as supplied.
    url: String,
    /// Connection configuration.
    config: ConnectionConfig,
    /// Notification handler.
    handler: Option<Arc<dyn SocketHandler>>,
    /// Transport factory override.
    factory: Option<Arc<dyn TransportFactory>>,
}

// ============================================================================
// SocketBuilder Implementation
// ============================================================================

impl SocketBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: ConnectionConfig::default(),
            handler: None,
            factory: None,
        }
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables diagnostic logging.
    #[inline]
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Sets whether `build` starts the first attempt.
    #[inline]
    #[must_use]
    pub fn automatic_open(mut self, automatic_open: bool) -> Self {
        self.config.automatic_open = automatic_open;
        self
    }

    /// Adds an offered sub-protocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.protocols.push(protocol.into());
        self
    }

    /// Adds multiple offered sub-protocols.
    #[inline]
    #[must_use]
    pub fn protocols(mut self, protocols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config
            .protocols
            .extend(protocols.into_iter().map(Into::into));
        self
    }

    /// Sets the initial reconnect delay.
    #[inline]
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    /// Sets the reconnect delay ceiling.
    #[inline]
    #[must_use]
    pub fn max_reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.max_reconnect_interval = interval;
        self
    }

    /// Sets the reconnect delay growth factor.
    #[inline]
    #[must_use]
    pub fn reconnect_decay(mut self, decay: f64) -> Self {
        self.config.reconnect_decay = decay;
        self
    }

    /// Sets the connect attempt timeout.
    #[inline]
    #[must_use]
    pub fn timeout_interval(mut self, timeout: Duration) -> Self {
        self.config.timeout_interval = timeout;
        self
    }

    /// Caps the number of consecutive failed attempts.
    #[inline]
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Sets the binary frame representation hint.
    #[inline]
    #[must_use]
    pub fn binary_type(mut self, binary_type: BinaryType) -> Self {
        self.config.binary_type = binary_type;
        self
    }

    /// Sets the notification handler.
    #[inline]
    #[must_use]
    pub fn handler(mut self, handler: impl SocketHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sets a handler that is shared with other owners.
    #[inline]
    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn SocketHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Overrides how transports are created.
    #[inline]
    #[must_use]
    pub fn transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Builds the socket with validation.
    ///
    /// Starts the first attempt when automatic open is enabled.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL does not parse or is not `ws`/`wss`
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Config`] if called outside a Tokio runtime
    pub fn build(self) -> Result<ReconnectingSocket> {
        let url = self.validate_url()?;
        self.config.validate()?;

        let handler = self.handler.unwrap_or_else(|| Arc::new(NoopHandler));
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(WebSocketFactory::new()));

        ReconnectingSocket::spawn(url, self.config, factory, handler)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SocketBuilder {
    /// Validates the endpoint URL.
    fn validate_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|e| Error::invalid_url(&self.url, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::invalid_url(
                &self.url,
                format!("unsupported scheme `{scheme}`, expected ws or wss"),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
