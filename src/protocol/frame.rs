//! Inbound frames and the message decode helper.
//!
//! The socket adds no framing of its own: a [`Frame`] is exactly what the
//! transport delivered. Text frames carry JSON; anything else is rejected by
//! the decoder with a distinguishable error.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, from_str, from_value};

use crate::error::{Error, Result};

use super::Envelope;

// ============================================================================
// Frame
// ============================================================================

/// A single message as delivered by, or handed to, a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns a short name for the frame kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// Returns the text content, if this is a text frame.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

// ============================================================================
// Decode Helper
// ============================================================================

/// Parses an inbound frame as JSON.
///
/// # Errors
///
/// - [`Error::UnsupportedPayloadType`] if the frame is not text
/// - [`Error::MalformedPayload`] if the text is not valid JSON
pub fn decode_frame(frame: &Frame) -> Result<Value> {
    let text = frame
        .as_text()
        .ok_or_else(|| Error::unsupported_payload_type(frame.kind()))?;

    from_str(text).map_err(Error::malformed_payload)
}

/// Parses an inbound frame as a `{status, data?}` envelope.
///
/// # Errors
///
/// Same as [`decode_frame`], plus [`Error::MalformedPayload`] when the JSON
/// does not have the envelope shape.
pub fn decode_envelope(frame: &Frame) -> Result<Envelope> {
    let value = decode_frame(frame)?;
    from_value(value).map_err(Error::malformed_payload)
}

// ============================================================================
// Tests
// ============================================================================
