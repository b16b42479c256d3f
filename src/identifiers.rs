//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing attempt numbers with counters such as
//! the failed-attempt count.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// AttemptId
// ============================================================================

/// Identifies one transport attempt of a socket.
///
/// Every call that creates a transport receives a fresh, strictly increasing
/// id. Transport events carry the id of the attempt that produced them so
/// late events from a discarded transport can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl AttemptId {
    /// Creates an attempt id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the id following this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
