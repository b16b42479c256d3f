//! Message types carried over the socket.
//!
//! The socket adds no framing beyond what the transport defines. This module
//! only covers the JSON conventions layered on top of text frames.
//!
//! # Message Types
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `Frame` | Both | One transport message (text or binary) |
//! | `Envelope` | Both | Structured `{status, data?}` body |
//! | `Payload` | Outbound | Input accepted by send operations |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope and outbound payloads |
//! | `frame` | Frames and the decode helper |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope and outbound payload types.
pub mod envelope;

/// Frames and the message decode helper.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, Payload};
pub use frame::{Frame, decode_envelope, decode_frame};
