//! CLI for Roomcast
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `client`: connect, subscribe to chats and print every frame received
//!   (useful for smoke tests)

use std::sync::Arc;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use roomcast::auth;
use roomcast::broker::{Broker, ChatId};
use roomcast::config::load_config;
use roomcast::transport::message::{ClientFrame, ServerFrame};
use roomcast::transport::websocket::start_websocket_server;
use roomcast::utils::logging;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "roomcast")]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Run a client that subscribes to chats and prints incoming events
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Access key presented on the subscribe frame
        #[arg(long, env = "ROOMCAST_ACCESS_KEY")]
        access_key: String,
        /// Comma-separated chat ids, e.g. `--chats 42,43`
        #[arg(long, value_delimiter = ',', required = true)]
        chats: Vec<ChatId>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                // no-op if the configured subscriber is already installed
                logging::init("info");
                error!("Server failed: {}", e);
            }
        }
        Command::Client {
            url,
            access_key,
            chats,
        } => {
            logging::init("info");
            if let Err(e) = run_client(&url, access_key, chats).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.logging.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let validator = auth::from_settings(&config.auth)?;
    let broker = Arc::new(Broker::new(&config.broker));
    info!(backend = ?config.auth.backend, "credential validator ready");

    tokio::select! {
        res = start_websocket_server(addr, broker, validator, config.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(
    url: &str,
    access_key: String,
    chats: Vec<ChatId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut ws_stream, _response) = connect_async(url).await?;

    let subscribe = ClientFrame::subscribe(access_key, chats);
    ws_stream
        .send(WsMessage::text(serde_json::to_string(&subscribe)?))
        .await?;

    while let Some(msg) = ws_stream.next().await {
        match msg? {
            WsMessage::Text(text) => print_frame(text.as_str()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    info!("connection closed");
    Ok(())
}

fn print_frame(text: &str) {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Event(event)) => {
            println!("{} in chat {}: {text}", event.kind(), event.chat_id())
        }
        Ok(ServerFrame::Error(err)) => {
            println!("error from server: {text}");
            if err.error_code.is_some() {
                warn!("access key rejected, log in again");
            }
        }
        Err(_) => println!("unrecognized frame: {text}"),
    }
}
