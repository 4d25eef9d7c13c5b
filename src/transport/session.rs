//! Authentication gate
//!
//! A `Session` drives one connection through
//! `Unauthenticated → Authenticated → Closed` (the WebSocket upgrade itself is
//! the implicit `Connecting` step before a session exists).
//!
//! - The first frame must carry an `accessKey`. It is validated before the
//!   connection is registered, so a rejected key never leaves registry or
//!   index state behind.
//! - Once authenticated, frames may omit the key. A frame that does carry
//!   one is validated again, and a key that is no longer valid (or belongs
//!   to someone else) ends the session.
//! - `subscribe` adds the listed chats; unknown events are ignored.
//!
//! Any `Err` returned from [`Session::handle_text`] is terminal: the caller
//! sends the matching error frame with [`Session::reject`] and then calls
//! [`Session::close`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::auth::{CredentialValidator, SubjectId};
use crate::broker::Broker;
use crate::connection::Connection;
use crate::transport::message::{ClientFrame, ErrorFrame, SUBSCRIBE, SubscribeData};
use crate::utils::error::{AuthError, BrokerError, GateError, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { subject_id: SubjectId },
    Closed,
}

pub struct Session {
    connection: Connection,
    broker: Arc<Broker>,
    validator: Arc<dyn CredentialValidator>,
    state: SessionState,
}

impl Session {
    pub fn new(
        connection: Connection,
        broker: Arc<Broker>,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        Self {
            connection,
            broker,
            validator,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Process one text control frame.
    pub async fn handle_text(&mut self, text: &str) -> Result<(), GateError> {
        let frame: ClientFrame = serde_json::from_str(text).map_err(ProtocolError::from)?;
        let subject_id = self.authenticate(frame.access_key.as_deref()).await?;

        match frame.event.as_deref() {
            Some(SUBSCRIBE) => {
                let data = frame.event_data.ok_or(ProtocolError::MissingEventData)?;
                let data: SubscribeData =
                    serde_json::from_value(data).map_err(ProtocolError::from)?;
                for chat_id in &data.chats {
                    self.broker.subscribe(*chat_id, &self.connection)?;
                }
                debug!(
                    connection = %self.connection.id(),
                    subject_id,
                    chats = ?data.chats,
                    "subscribed"
                );
            }
            Some(other) => {
                debug!(connection = %self.connection.id(), event = other, "ignoring unknown event");
            }
            None => {}
        }
        Ok(())
    }

    async fn authenticate(&mut self, access_key: Option<&str>) -> Result<SubjectId, GateError> {
        let presented = access_key.filter(|key| !key.is_empty());

        match (self.state, presented) {
            (SessionState::Unauthenticated, None) => Err(ProtocolError::Unauthenticated.into()),
            (SessionState::Unauthenticated, Some(key)) => {
                let subject_id = self.validator.validate(key).await?;
                self.broker.register(&self.connection, subject_id)?;
                self.state = SessionState::Authenticated { subject_id };
                info!(connection = %self.connection.id(), subject_id, "authenticated");
                Ok(subject_id)
            }
            (SessionState::Authenticated { subject_id }, None) => Ok(subject_id),
            (SessionState::Authenticated { subject_id }, Some(key)) => {
                let presented = self.validator.validate(key).await?;
                if presented != subject_id {
                    return Err(AuthError::SubjectMismatch {
                        bound: subject_id,
                        presented,
                    }
                    .into());
                }
                Ok(subject_id)
            }
            (SessionState::Closed, _) => Err(BrokerError::Closed(self.connection.id()).into()),
        }
    }

    /// Queue the error frame for `err`. Best effort: the peer may already be
    /// gone.
    pub async fn reject(&self, err: &GateError) {
        match err {
            GateError::Auth(e) if e.is_credential_failure() => {
                info!(connection = %self.connection.id(), "rejected: {err}")
            }
            GateError::Protocol(_) => warn!(connection = %self.connection.id(), "rejected: {err}"),
            _ => error!(connection = %self.connection.id(), "rejected: {err}"),
        }

        let frame = match ErrorFrame::from(err).to_message() {
            Ok(frame) => frame,
            Err(e) => {
                error!("failed to serialize error frame: {e}");
                return;
            }
        };
        if let Err(e) = self
            .connection
            .deliver(frame, self.broker.delivery_timeout())
            .await
        {
            debug!("error frame not delivered: {e}");
        }
    }

    /// Hand the connection to lifecycle cleanup. Safe to call more than once.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.broker.on_connection_closed(&self.connection);
    }
}
