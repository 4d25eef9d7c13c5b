//! The `connection` module defines the handle the broker keeps for each
//! accepted WebSocket.
//!
//! It provides the `Connection` type, which bundles a unique identifier, the
//! sending side of the connection's outbound channel and the closed flag the
//! lifecycle cleanup flips exactly once.

pub mod handle;
pub use handle::{Connection, ConnectionId};
