//! Connection handle
//!
//! `Connection` models one accepted WebSocket and holds the sending side of a
//! bounded per-connection channel used by the broker to push frames. The
//! transport owns the socket itself: a writer task drains the channel and a
//! reader task feeds the authentication gate. Both stop once the closed flag
//! is set.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::utils::error::DeliveryError;

/// Server-generated identity of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct Inner {
    id: ConnectionId,
    sender: mpsc::Sender<WsMessage>,
    closed: watch::Sender<bool>,
}

/// Cheaply cloneable handle to a live connection. Equality and hashing go by
/// [`ConnectionId`] only.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Wrap the sending half of an outbound channel. A fresh id is assigned.
    pub fn new(sender: mpsc::Sender<WsMessage>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                id: ConnectionId::new(),
                sender,
                closed,
            }),
        }
    }

    /// Create a connection together with the receiving half its writer
    /// task drains. `capacity` is clamped to at least one slot.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Set the closed flag and wake every task waiting in [`Connection::closed`].
    /// Returns the previous value, so only the first caller sees `false`.
    pub(crate) fn mark_closed(&self) -> bool {
        self.inner.closed.send_replace(true)
    }

    /// Resolves once the connection has been marked closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Queue a frame for the writer task, waiting at most `timeout` for
    /// buffer space. A full buffer past the deadline means the peer is not
    /// draining and is reported as [`DeliveryError::TimedOut`].
    pub async fn deliver(&self, frame: WsMessage, timeout: Duration) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed(self.id()));
        }

        match tokio::time::timeout(timeout, self.inner.sender.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed(self.id())),
            Err(_) => Err(DeliveryError::TimedOut(self.id(), timeout)),
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
