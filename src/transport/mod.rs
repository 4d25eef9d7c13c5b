//! The `transport` module is responsible for handling network communication
//! with clients via WebSockets.
//!
//! It defines the control and event frames exchanged with clients, the
//! per-connection authentication gate, and the WebSocket server that wires
//! accepted sockets to the broker.

pub mod message;
pub mod session;
pub mod websocket;

pub use message::{ClientFrame, ErrorFrame, ServerFrame};
pub use session::{Session, SessionState};
pub use websocket::{serve, start_websocket_server};

#[cfg(test)]
mod tests;
