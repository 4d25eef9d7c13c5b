//! WebSocket transport
//!
//! This file implements the WebSocket server that connects clients to the
//! broker. Responsibilities:
//! - Accept TCP/WebSocket connections and give each a `Connection` handle
//!   with a bounded outbound channel
//! - Run one writer task per connection that drains the channel into the
//!   socket
//! - Feed inbound text frames to the connection's `Session` (the
//!   authentication gate) and close the connection on the first gate error,
//!   after sending the matching error frame
//! - Close connections that do not authenticate within
//!   `server.auth_timeout_secs`, counted from TCP accept and covering the
//!   upgrade and any credential check still in flight
//!
//! Every way a connection can end (client close, read error, write error,
//! gate error, handshake timeout, failed broker delivery) funnels into
//! `Broker::on_connection_closed`, which makes the teardown happen once.

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::auth::CredentialValidator;
use crate::broker::Broker;
use crate::config::Settings;
use crate::connection::Connection;
use crate::transport::session::Session;
use crate::utils::error::{GateError, ProtocolError, ServerError};

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// The single window a connection has to upgrade and authenticate.
#[derive(Debug, Clone, Copy)]
struct Handshake {
    deadline: Instant,
    timeout: Duration,
}

impl Handshake {
    fn starting_now(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    fn expired(&self) -> GateError {
        ProtocolError::HandshakeTimeout(self.timeout).into()
    }
}

/// Bind `addr` and serve until the listener fails.
pub async fn start_websocket_server(
    addr: String,
    broker: Arc<Broker>,
    validator: Arc<dyn CredentialValidator>,
    settings: Settings,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on ws://{addr}");
    serve(listener, broker, validator, settings).await;
    Ok(())
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    broker: Arc<Broker>,
    validator: Arc<dyn CredentialValidator>,
    settings: Settings,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        let broker = broker.clone();
        let validator = validator.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, broker, validator, settings).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
    validator: Arc<dyn CredentialValidator>,
    settings: Settings,
) {
    let handshake =
        Handshake::starting_now(Duration::from_secs(settings.server.auth_timeout_secs));

    let upgrade = tokio::time::timeout_at(handshake.deadline, accept_async(stream)).await;
    let ws_stream = match upgrade {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            warn!(%peer, "WebSocket handshake error: {e}");
            return;
        }
        Err(_) => {
            warn!(%peer, "WebSocket handshake timed out");
            return;
        }
    };

    let (sink, mut source) = ws_stream.split();
    let (connection, rx) = Connection::channel(settings.broker.outbound_buffer);
    info!(%peer, connection = %connection.id(), "connection opened");

    let writer = tokio::spawn(write_loop(
        sink,
        rx,
        connection.clone(),
        broker.clone(),
        broker.delivery_timeout(),
    ));

    let mut session = Session::new(connection.clone(), broker, validator);
    let deadline = tokio::time::sleep_until(handshake.deadline);
    tokio::pin!(deadline);

    let outcome: Result<(), GateError> = loop {
        tokio::select! {
            _ = connection.closed() => break Ok(()),
            _ = &mut deadline, if !session.is_authenticated() => break Err(handshake.expired()),
            msg = source.next() => match process(&mut session, msg, handshake).await {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break Ok(()),
                Err(e) => break Err(e),
            },
        }
    };

    if let Err(err) = &outcome {
        session.reject(err).await;
    }
    session.close();

    if let Err(e) = writer.await {
        warn!(connection = %connection.id(), "writer task failed: {e}");
    }
    info!(%peer, connection = %connection.id(), "connection closed");
}

/// The gate call races the connection's close and, before authentication,
/// the handshake deadline. Dropping it mid-check leaves no state behind:
/// registration only happens after the validator has answered.
async fn process(
    session: &mut Session,
    msg: Option<Result<WsMessage, tungstenite::Error>>,
    handshake: Handshake,
) -> Result<ControlFlow<()>, GateError> {
    match msg {
        Some(Ok(WsMessage::Text(text))) => {
            let authenticated = session.is_authenticated();
            let connection = session.connection().clone();
            tokio::select! {
                res = session.handle_text(text.as_str()) => res?,
                _ = connection.closed() => return Ok(ControlFlow::Break(())),
                _ = tokio::time::sleep_until(handshake.deadline), if !authenticated => {
                    return Err(handshake.expired());
                }
            }
            Ok(ControlFlow::Continue(()))
        }
        Some(Ok(WsMessage::Binary(_))) => Err(ProtocolError::NonTextFrame.into()),
        Some(Ok(WsMessage::Close(_))) | None => Ok(ControlFlow::Break(())),
        // ping/pong are answered by tungstenite
        Some(Ok(_)) => Ok(ControlFlow::Continue(())),
        Some(Err(e)) => {
            debug!(connection = %session.connection().id(), "read error: {e}");
            Ok(ControlFlow::Break(()))
        }
    }
}

/// Drain the outbound channel into the socket until the connection closes
/// or a write fails. `biased` keeps frames queued before the close (a
/// rejection, for instance) ahead of the close itself.
async fn write_loop(
    mut sink: WsSink,
    mut rx: mpsc::Receiver<WsMessage>,
    connection: Connection,
    broker: Arc<Broker>,
    send_timeout: Duration,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = connection.closed() => break,
        };

        match tokio::time::timeout(send_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection = %connection.id(), "write failed: {e}");
                break;
            }
            Err(_) => {
                warn!(connection = %connection.id(), "write timed out after {send_timeout:?}");
                break;
            }
        }
    }

    broker.on_connection_closed(&connection);
    if let Ok(Err(e)) = tokio::time::timeout(send_timeout, sink.close()).await {
        debug!(connection = %connection.id(), "close handshake failed: {e}");
    }
    debug!(connection = %connection.id(), "send loop closed");
}
