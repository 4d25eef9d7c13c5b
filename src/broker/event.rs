//! Event definitions for the broker
//!
//! `Event` is what upstream request handling hands to `Broker::publish` once a
//! domain change is durably committed. Its serde form is the outbound wire
//! frame, so serialization happens exactly once per publish:
//!
//! ```json
//! { "event": "newMessage", "eventData": { "chatId": 42, "messageId": 100, "senderId": 7, "text": "hi", "ts": 1700000000 } }
//! { "event": "messagesDeleted", "eventData": { "chatId": 43, "deletedMessageIds": [5, 6] } }
//! ```

use serde::{Deserialize, Serialize};
use tungstenite::protocol::Message as WsMessage;

use crate::auth::SubjectId;
use crate::broker::topic::ChatId;

pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "eventData", rename_all = "camelCase")]
pub enum Event {
    NewMessage(NewMessage),
    MessagesDeleted(MessagesDeleted),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender_id: SubjectId,
    pub text: String,
    /// Seconds since the UNIX epoch.
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesDeleted {
    pub chat_id: ChatId,
    pub deleted_message_ids: Vec<MessageId>,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::NewMessage(_) => "newMessage",
            Event::MessagesDeleted(_) => "messagesDeleted",
        }
    }

    /// The chat the event was produced in.
    pub fn chat_id(&self) -> ChatId {
        match self {
            Event::NewMessage(m) => m.chat_id,
            Event::MessagesDeleted(m) => m.chat_id,
        }
    }

    pub fn to_frame(&self) -> Result<WsMessage, serde_json::Error> {
        serde_json::to_string(self).map(WsMessage::text)
    }
}

impl From<NewMessage> for Event {
    fn from(msg: NewMessage) -> Self {
        Event::NewMessage(msg)
    }
}

impl From<MessagesDeleted> for Event {
    fn from(msg: MessagesDeleted) -> Self {
        Event::MessagesDeleted(msg)
    }
}
