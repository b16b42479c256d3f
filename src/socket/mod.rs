//! The connection controller.
//!
//! [`ReconnectingSocket`] owns the lifecycle state, creates and discards
//! transports, runs the connect-timeout and reconnect timers, and re-exposes
//! transport notifications through a stable [`SocketHandler`].
//!
//! # State Machine
//!
//! ```text
//!            connect(false)
//!   CLOSED ───────────────► CONNECTING ◄──────────────┐
//!     ▲                        │    ▲                 │ retry after backoff
//!     │                   open │    │ lost / timeout  │
//!     │                        ▼    │                 │
//!     │  close event         OPEN ──┴─────────────────┘
//!     └──────── CLOSING ◄──────┘ close()
//! ```
//!
//! A closure the caller did not request keeps the socket `CONNECTING` and
//! schedules a retry. Only the first failure of an episode reaches
//! [`SocketHandler::on_close`]; later failures emit `on_connecting` only.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect delay policy |
//! | `builder` | Fluent socket construction |
//! | `core` | Socket handle and driver task |
//! | `event` | Handler notification payloads |
//! | `handler` | Handler trait and closure adapter |
//! | `state` | Status, close causes, private state |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect delay policy.
pub mod backoff;

/// Builder for socket configuration.
pub mod builder;

/// Socket handle and driver task.
pub mod core;

/// Handler notification payloads.
pub mod event;

/// Notification hooks.
pub mod handler;

/// Lifecycle status and close causes.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::Backoff;
pub use builder::SocketBuilder;
pub use core::ReconnectingSocket;
pub use event::{CloseEvent, ConnectingEvent, ErrorEvent, OpenEvent};
pub use handler::{Callbacks, NoopHandler, SocketHandler};
pub use state::{CloseCause, ConnectionStatus};

pub(crate) use core::Signal;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests;
