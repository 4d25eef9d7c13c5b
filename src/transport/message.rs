//! Wire frames
//!
//! Inbound control frames carry the client's access key with every request:
//!
//! ```json
//! { "accessKey": "<token>", "event": "subscribe", "eventData": { "chats": [42, 43] } }
//! ```
//!
//! Outbound frames are either a serialized [`Event`] or an [`ErrorFrame`].

use serde::{Deserialize, Serialize};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{ChatId, Event};
use crate::utils::error::{AuthError, BrokerError, GateError, ProtocolError};

/// `errorCode` telling the client its access key is invalid or expired and
/// it has to log in again.
pub const ERR_INVALID_ACCESS_KEY: u8 = 1;

pub const SUBSCRIBE: &str = "subscribe";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Kept raw: its shape depends on `event`, and unknown events must not
    /// fail to parse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SubscribeData {
    pub chats: Vec<ChatId>,
}

impl ClientFrame {
    pub fn subscribe(access_key: impl Into<String>, chats: Vec<ChatId>) -> Self {
        Self {
            access_key: Some(access_key.into()),
            event: Some(SUBSCRIBE.to_string()),
            event_data: Some(serde_json::json!({ "chats": chats })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFrame {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u8>,
}

impl ErrorFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            error_code: None,
        }
    }

    pub fn invalid_access_key() -> Self {
        Self {
            error: "Invalid access key".to_string(),
            error_code: Some(ERR_INVALID_ACCESS_KEY),
        }
    }

    pub fn to_message(&self) -> Result<WsMessage, serde_json::Error> {
        serde_json::to_string(self).map(WsMessage::text)
    }
}

/// Only credential failures are described to the client; everything else
/// gets a fixed message.
impl From<&GateError> for ErrorFrame {
    fn from(err: &GateError) -> Self {
        match err {
            GateError::Auth(AuthError::Backend(_)) => ErrorFrame::new("Server internal error"),
            GateError::Auth(_) => ErrorFrame::invalid_access_key(),
            GateError::Protocol(ProtocolError::Unauthenticated) => ErrorFrame::new("Access denied"),
            GateError::Protocol(ProtocolError::HandshakeTimeout(_)) => {
                ErrorFrame::new("Authentication timeout")
            }
            GateError::Protocol(_) => ErrorFrame::new("Invalid frame"),
            GateError::Broker(BrokerError::CapacityReached(_)) => ErrorFrame::new("Server is busy"),
            GateError::Broker(_) => ErrorFrame::new("Server internal error"),
        }
    }
}

/// Anything the server may send, as seen by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Error(ErrorFrame),
    Event(Event),
}
