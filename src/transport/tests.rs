use crate::auth::{CredentialValidator, StaticValidator};
use crate::broker::{Broker, Event, MessagesDeleted};
use crate::connection::Connection;
use crate::transport::message::{ClientFrame, ERR_INVALID_ACCESS_KEY, ErrorFrame, ServerFrame};
use crate::transport::session::{Session, SessionState};
use crate::utils::error::{AuthError, BrokerError, GateError, ProtocolError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn validator() -> Arc<dyn CredentialValidator> {
    Arc::new(
        StaticValidator::new()
            .with_token("alice-key", 7)
            .with_token("alice-second-key", 7)
            .with_token("bob-key", 8),
    )
}

fn session(broker: &Arc<Broker>) -> (Session, mpsc::Receiver<WsMessage>) {
    let (connection, rx) = Connection::channel(8);
    (Session::new(connection, broker.clone(), validator()), rx)
}

fn error_frame(rx: &mut mpsc::Receiver<WsMessage>) -> ErrorFrame {
    match rx.try_recv().expect("expected an error frame") {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[test]
fn test_client_frame_parses_subscribe() {
    let frame: ClientFrame = serde_json::from_value(json!({
        "accessKey": "alice-key",
        "event": "subscribe",
        "eventData": { "chats": [42, 43] }
    }))
    .unwrap();

    assert_eq!(frame.access_key.as_deref(), Some("alice-key"));
    assert_eq!(frame.event.as_deref(), Some("subscribe"));
    assert_eq!(frame.event_data, Some(json!({ "chats": [42, 43] })));
}

#[test]
fn test_client_frame_fields_are_optional() {
    let frame: ClientFrame = serde_json::from_str("{}").unwrap();
    assert!(frame.access_key.is_none());
    assert!(frame.event.is_none());
    assert!(frame.event_data.is_none());
}

#[test]
fn test_client_frame_subscribe_constructor() {
    let value = serde_json::to_value(ClientFrame::subscribe("k", vec![1, 2])).unwrap();
    assert_eq!(
        value,
        json!({ "accessKey": "k", "event": "subscribe", "eventData": { "chats": [1, 2] } })
    );
}

#[test]
fn test_error_frame_shapes() {
    assert_eq!(
        serde_json::to_value(ErrorFrame::invalid_access_key()).unwrap(),
        json!({ "error": "Invalid access key", "errorCode": 1 })
    );
    assert_eq!(
        serde_json::to_value(ErrorFrame::new("Invalid frame")).unwrap(),
        json!({ "error": "Invalid frame" })
    );
}

#[test]
fn test_error_frame_from_gate_error() {
    let cases = [
        (
            GateError::from(AuthError::InvalidToken),
            ErrorFrame::invalid_access_key(),
        ),
        (
            GateError::from(AuthError::Expired),
            ErrorFrame::invalid_access_key(),
        ),
        (
            GateError::from(AuthError::Backend("io".to_string())),
            ErrorFrame::new("Server internal error"),
        ),
        (
            GateError::from(ProtocolError::Unauthenticated),
            ErrorFrame::new("Access denied"),
        ),
        (
            GateError::from(ProtocolError::NonTextFrame),
            ErrorFrame::new("Invalid frame"),
        ),
        (
            GateError::from(ProtocolError::HandshakeTimeout(Duration::from_secs(1))),
            ErrorFrame::new("Authentication timeout"),
        ),
        (
            GateError::from(BrokerError::CapacityReached(1)),
            ErrorFrame::new("Server is busy"),
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(ErrorFrame::from(&err), expected, "for {err}");
    }
}

#[test]
fn test_server_frame_distinguishes_errors_from_events() {
    let err: ServerFrame =
        serde_json::from_str(r#"{"error":"Invalid access key","errorCode":1}"#).unwrap();
    assert_eq!(err, ServerFrame::Error(ErrorFrame::invalid_access_key()));

    let event: ServerFrame = serde_json::from_str(
        r#"{"event":"messagesDeleted","eventData":{"chatId":43,"deletedMessageIds":[5,6]}}"#,
    )
    .unwrap();
    assert_eq!(
        event,
        ServerFrame::Event(Event::MessagesDeleted(MessagesDeleted {
            chat_id: 43,
            deleted_message_ids: vec![5, 6],
        }))
    );
}

#[tokio::test]
async fn test_valid_subscribe_registers_and_subscribes() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    let frame = json!({ "accessKey": "alice-key", "event": "subscribe", "eventData": { "chats": [42, 43] } });
    session.handle_text(&frame.to_string()).await.unwrap();

    let id = session.connection().id();
    assert_eq!(session.state(), SessionState::Authenticated { subject_id: 7 });
    assert_eq!(broker.subject_of(&id), Some(7));
    assert_eq!(broker.topics_of(&id), vec![42, 43]);
}

#[tokio::test]
async fn test_invalid_key_is_rejected_without_state() {
    let broker = Arc::new(Broker::default());
    let (mut session, mut rx) = session(&broker);

    let frame = json!({ "accessKey": "nope", "event": "subscribe", "eventData": { "chats": [42] } });
    let err = session.handle_text(&frame.to_string()).await.unwrap_err();
    assert!(matches!(err, GateError::Auth(AuthError::InvalidToken)));

    session.reject(&err).await;
    let sent = error_frame(&mut rx);
    assert_eq!(sent.error_code, Some(ERR_INVALID_ACCESS_KEY));

    session.close();
    assert_eq!(broker.connection_count(), 0);
    assert!(!broker.contains_topic(42));
    assert!(session.connection().is_closed());
}

#[tokio::test]
async fn test_first_frame_without_key_is_rejected() {
    let broker = Arc::new(Broker::default());
    let (mut session, mut rx) = session(&broker);

    let frame = json!({ "event": "subscribe", "eventData": { "chats": [42] } });
    let err = session.handle_text(&frame.to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        GateError::Protocol(ProtocolError::Unauthenticated)
    ));

    session.reject(&err).await;
    assert_eq!(error_frame(&mut rx), ErrorFrame::new("Access denied"));
    assert!(!broker.contains_topic(42));
}

#[tokio::test]
async fn test_empty_key_counts_as_missing() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    let frame = json!({ "accessKey": "", "event": "subscribe", "eventData": { "chats": [42] } });
    let err = session.handle_text(&frame.to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        GateError::Protocol(ProtocolError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_malformed_frame_is_a_protocol_error() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    let err = session.handle_text("{not json").await.unwrap_err();
    assert!(matches!(err, GateError::Protocol(ProtocolError::Malformed(_))));
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_subscribe_without_event_data() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    let frame = json!({ "accessKey": "alice-key", "event": "subscribe" });
    let err = session.handle_text(&frame.to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        GateError::Protocol(ProtocolError::MissingEventData)
    ));
}

#[tokio::test]
async fn test_unknown_event_is_ignored_after_auth() {
    let broker = Arc::new(Broker::default());
    let (mut session, mut rx) = session(&broker);

    let frame = json!({ "accessKey": "alice-key", "event": "typing", "eventData": { "chatId": 42 } });
    session.handle_text(&frame.to_string()).await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(broker.topic_count(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_later_frames_may_omit_key() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    session
        .handle_text(&json!({ "accessKey": "alice-key" }).to_string())
        .await
        .unwrap();
    session
        .handle_text(&json!({ "event": "subscribe", "eventData": { "chats": [42] } }).to_string())
        .await
        .unwrap();

    assert_eq!(broker.subscriber_count(42), 1);
}

#[tokio::test]
async fn test_later_key_for_same_subject_is_accepted() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    session
        .handle_text(&json!({ "accessKey": "alice-key" }).to_string())
        .await
        .unwrap();
    session
        .handle_text(
            &json!({ "accessKey": "alice-second-key", "event": "subscribe", "eventData": { "chats": [42] } })
                .to_string(),
        )
        .await
        .unwrap();

    assert_eq!(broker.subscriber_count(42), 1);
}

#[tokio::test]
async fn test_later_invalid_key_ends_session() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    session
        .handle_text(&json!({ "accessKey": "alice-key", "event": "subscribe", "eventData": { "chats": [42] } }).to_string())
        .await
        .unwrap();

    let err = session
        .handle_text(&json!({ "accessKey": "revoked", "event": "subscribe", "eventData": { "chats": [43] } }).to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Auth(AuthError::InvalidToken)));
    assert!(!broker.contains_topic(43));

    session.close();
    assert!(!broker.contains_topic(42));
    assert_eq!(broker.connection_count(), 0);
}

#[tokio::test]
async fn test_key_of_another_subject_is_a_mismatch() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    session
        .handle_text(&json!({ "accessKey": "alice-key" }).to_string())
        .await
        .unwrap();
    let err = session
        .handle_text(&json!({ "accessKey": "bob-key" }).to_string())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GateError::Auth(AuthError::SubjectMismatch {
            bound: 7,
            presented: 8
        })
    ));
    assert_eq!(ErrorFrame::from(&err), ErrorFrame::invalid_access_key());
}

#[tokio::test]
async fn test_closed_session_refuses_frames() {
    let broker = Arc::new(Broker::default());
    let (mut session, _rx) = session(&broker);

    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);

    let err = session
        .handle_text(&json!({ "accessKey": "alice-key" }).to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Broker(BrokerError::Closed(_))));
    assert_eq!(broker.connection_count(), 0);
}

#[tokio::test]
async fn test_full_broker_answers_busy() {
    let broker = Arc::new(Broker::new(&crate::config::BrokerSettings {
        max_connections: 1,
        ..Default::default()
    }));
    let (mut first, _rx_first) = session(&broker);
    let (mut second, mut rx_second) = session(&broker);

    first
        .handle_text(&json!({ "accessKey": "alice-key" }).to_string())
        .await
        .unwrap();
    let err = second
        .handle_text(&json!({ "accessKey": "bob-key" }).to_string())
        .await
        .unwrap_err();

    second.reject(&err).await;
    assert_eq!(error_frame(&mut rx_second), ErrorFrame::new("Server is busy"));
}
