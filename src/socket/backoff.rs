//! Reconnect delay policy.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::config::ConnectionConfig;

// ============================================================================
// Backoff
// ============================================================================

/// Exponential backoff bounded by a ceiling.
///
/// The delay before retry `n` (counting from 1) is
/// `min(initial * decay^(n - 1), max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    decay: f64,
}

impl Backoff {
    /// Creates a policy.
    #[inline]
    #[must_use]
    pub const fn new(initial: Duration, max: Duration, decay: f64) -> Self {
        Self {
            initial,
            max,
            decay,
        }
    }

    /// Creates the policy described by a configuration.
    #[inline]
    #[must_use]
    pub const fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(
            config.reconnect_interval,
            config.max_reconnect_interval,
            config.reconnect_decay,
        )
    }

    /// Returns the delay before retry `attempt`.
    ///
    /// Attempt 0 is treated like attempt 1.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.initial.min(self.max);
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let scaled = self.initial.as_nanos() as f64 * self.decay.powi(exponent);

        if !scaled.is_finite() || scaled >= self.max.as_nanos() as f64 {
            return self.max;
        }

        Duration::from_nanos(scaled.max(0.0) as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
