//! Outbound payloads.
//!
//! A payload handed to [`send`](crate::ReconnectingSocket::send) is either
//! raw text or a structured envelope. Envelopes are serialized to a text
//! frame; the wire carries nothing else.
//!
//! # Envelope Format
//!
//! ```json
//! { "status": "update", "data": { ... } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, to_string};

use crate::error::{Error, Result};

use super::Frame;

// ============================================================================
// Envelope
// ============================================================================

/// Structured `{status, data?}` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message status or kind.
    pub status: String,

    /// Optional message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Creates an envelope without data.
    #[inline]
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            data: None,
        }
    }

    /// Attaches a data body.
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serializes the envelope to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the data cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Anything that can be passed to a send operation.
///
/// [`Payload::Json`] is checked at send time: a JSON string is sent as
/// text, an object with a string `status` is sent as an envelope, any other
/// value is rejected with [`Error::InvalidPayloadKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw text, sent unchanged.
    Text(String),
    /// Structured envelope, serialized before sending.
    Envelope(Envelope),
    /// Untyped JSON value, validated before sending.
    Json(Value),
    /// Raw bytes, sent as a binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Converts the payload into the frame that goes on the wire.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPayloadKind`] for JSON values that are neither text
    ///   nor envelope-shaped
    /// - [`Error::Json`] if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        match self {
            Self::Text(text) => Ok(Frame::Text(text)),
            Self::Envelope(envelope) => envelope.to_json().map(Frame::Text),
            Self::Binary(bytes) => Ok(Frame::Binary(bytes)),
            Self::Json(Value::String(text)) => Ok(Frame::Text(text)),
            Self::Json(value) if is_envelope_shaped(&value) => Ok(Frame::Text(to_string(&value)?)),
            Self::Json(value) => Err(Error::invalid_payload_kind(json_kind(&value))),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Envelope> for Payload {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn is_envelope_shaped(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|object| object.get("status"))
        .is_some_and(Value::is_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object without string status",
    }
}

// ============================================================================
// Tests
// ============================================================================
