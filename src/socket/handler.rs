//! Caller-facing notification hooks.
//!
//! Implement [`SocketHandler`] for a listener type, or assemble one from
//! closures with [`Callbacks`]. Every hook has a default; the message
//! pipeline's business hook, [`SocketHandler::message_logic`], defaults to an
//! error so that unhandled messages never pass silently.
//!
//! # Message Pipeline
//!
//! ```text
//! Frame ──► on_message ──► decode_frame ──► message_logic
//!               │                │                │
//!               └───── Err ──────┴────────────────┴──► on_message_error
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::error;

use crate::error::{Error, Result};
use crate::protocol::{Frame, decode_frame};

use super::{CloseEvent, ConnectingEvent, ErrorEvent, OpenEvent};

// ============================================================================
// SocketHandler
// ============================================================================

/// Receives lifecycle notifications and inbound messages.
///
/// Hooks run on the socket's driver task, never while internal locks are
/// held, so they may call back into the socket.
pub trait SocketHandler: Send + Sync {
    /// A connect attempt started or a retry was scheduled.
    fn on_connecting(&self, _event: &ConnectingEvent) {}

    /// The connection opened.
    fn on_open(&self, _event: &OpenEvent) {}

    /// The connection closed in a way callers should see.
    fn on_close(&self, _event: &CloseEvent) {}

    /// The transport reported an error.
    fn on_error(&self, _event: &ErrorEvent) {}

    /// Entry point for inbound frames.
    ///
    /// # Errors
    ///
    /// Decode errors from [`decode_frame`] and anything
    /// [`message_logic`](Self::message_logic) returns.
    fn on_message(&self, frame: &Frame) -> Result<()> {
        let message = decode_frame(frame)?;
        self.message_logic(message)
    }

    /// Business logic for decoded messages. Meant to be overridden.
    ///
    /// # Errors
    ///
    /// The default returns [`Error::UnimplementedHandler`].
    fn message_logic(&self, _message: Value) -> Result<()> {
        Err(Error::unimplemented_handler("message_logic"))
    }

    /// Receives errors raised by [`on_message`](Self::on_message) for frames
    /// that arrived from the transport.
    fn on_message_error(&self, error: Error) {
        error!(error = %error, "Inbound message was not handled");
    }
}

/// Handler with every hook left at its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl SocketHandler for NoopHandler {}

// ============================================================================
// Callbacks
// ============================================================================

type Hook<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Handler assembled from closures.
///
/// Unset hooks behave like the trait defaults.
///
/// # Example
///
/// ```ignore
/// let handler = Callbacks::new()
///     .with_open(|event| println!("open, reconnect={}", event.is_reconnect))
///     .with_message_logic(|message| {
///         println!("{message}");
///         Ok(())
///     });
/// ```
#[derive(Default)]
pub struct Callbacks {
    connecting: Option<Hook<ConnectingEvent>>,
    open: Option<Hook<OpenEvent>>,
    close: Option<Hook<CloseEvent>>,
    error: Option<Hook<ErrorEvent>>,
    message_logic: Option<Box<dyn Fn(Value) -> Result<()> + Send + Sync>>,
    message_error: Option<Box<dyn Fn(Error) + Send + Sync>>,
}

impl Callbacks {
    /// Creates a handler with no hooks set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connecting hook.
    #[must_use]
    pub fn with_connecting(mut self, hook: impl Fn(&ConnectingEvent) + Send + Sync + 'static) -> Self {
        self.connecting = Some(Box::new(hook));
        self
    }

    /// Sets the open hook.
    #[must_use]
    pub fn with_open(mut self, hook: impl Fn(&OpenEvent) + Send + Sync + 'static) -> Self {
        self.open = Some(Box::new(hook));
        self
    }

    /// Sets the close hook.
    #[must_use]
    pub fn with_close(mut self, hook: impl Fn(&CloseEvent) + Send + Sync + 'static) -> Self {
        self.close = Some(Box::new(hook));
        self
    }

    /// Sets the error hook.
    #[must_use]
    pub fn with_error(mut self, hook: impl Fn(&ErrorEvent) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(hook));
        self
    }

    /// Sets the business logic for decoded messages.
    #[must_use]
    pub fn with_message_logic(
        mut self,
        hook: impl Fn(Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.message_logic = Some(Box::new(hook));
        self
    }

    /// Sets the hook for message pipeline errors.
    #[must_use]
    pub fn with_message_error(mut self, hook: impl Fn(Error) + Send + Sync + 'static) -> Self {
        self.message_error = Some(Box::new(hook));
        self
    }
}

impl SocketHandler for Callbacks {
    fn on_connecting(&self, event: &ConnectingEvent) {
        if let Some(hook) = &self.connecting {
            hook(event);
        }
    }

    fn on_open(&self, event: &OpenEvent) {
        if let Some(hook) = &self.open {
            hook(event);
        }
    }

    fn on_close(&self, event: &CloseEvent) {
        if let Some(hook) = &self.close {
            hook(event);
        }
    }

    fn on_error(&self, event: &ErrorEvent) {
        if let Some(hook) = &self.error {
            hook(event);
        }
    }

    fn message_logic(&self, message: Value) -> Result<()> {
        match &self.message_logic {
            Some(hook) => hook(message),
            None => Err(Error::unimplemented_handler("message_logic")),
        }
    }

    fn on_message_error(&self, error: Error) {
        match &self.message_error {
            Some(hook) => hook(error),
            None => error!(error = %error, "Inbound message was not handled"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
