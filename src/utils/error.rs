//! The `error` module defines the error taxonomy used within `roomcast`.
//!
//! Each failure class that changes how a connection is treated has its own
//! enum so the transport can turn it into the right outbound error frame:
//! - [`AuthError`]: the presented access key is not (or no longer) valid
//! - [`ProtocolError`]: the client broke the control-frame protocol
//! - [`DeliveryError`]: pushing one event to one subscriber failed
//! - [`BrokerError`]: the broker refused a registry or index mutation
//! - [`StoreError`]: the sled-backed access key store failed
//! - [`GateError`]: anything that ends a connection inside the
//!   authentication gate
//! - [`ServerError`]: startup failures surfaced to `main`

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionId;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid access key")]
    InvalidToken,

    #[error("access key expired")]
    Expired,

    #[error("access key belongs to subject {presented}, connection is bound to {bound}")]
    SubjectMismatch { bound: i64, presented: i64 },

    #[error("credential backend failure: {0}")]
    Backend(String),
}

impl AuthError {
    /// Whether the client should be told to log in again (`errorCode: 1`).
    /// Backend failures are ours, not the client's.
    pub fn is_credential_failure(&self) -> bool {
        !matches!(self, AuthError::Backend(_))
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed control frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("control frames must be text")]
    NonTextFrame,

    #[error("frame received before authentication")]
    Unauthenticated,

    #[error("subscribe request without eventData")]
    MissingEventData,

    #[error("no authenticated frame within {0:?}")]
    HandshakeTimeout(Duration),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("delivery to {0} timed out after {1:?}")]
    TimedOut(ConnectionId, Duration),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),

    #[error("connection {0} is already closed")]
    Closed(ConnectionId),

    #[error("connection limit of {0} reached")]
    CapacityReached(usize),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt access key record: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("access key store error: {0}")]
    Store(#[from] StoreError),
}
