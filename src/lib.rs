//! # Roomcast
//!
//! `roomcast` is the real-time delivery half of a chat backend. Clients hold
//! a WebSocket open, authenticate with an access key and subscribe to the
//! chats they belong to; the embedding application calls
//! [`Broker::publish`](broker::Broker::publish) after it has committed a new
//! or deleted message, and the broker pushes the event to every subscriber of
//! that chat.
//!
//! ## Core Modules
//!
//! - `auth`: credential validators (JWT, sled-backed access keys, static table).
//! - `broker`: connection registry, topic index, lifecycle cleanup and event fan-out.
//! - `config`: layered configuration loading.
//! - `connection`: the per-socket handle the broker delivers through.
//! - `transport`: wire frames, the authentication gate and the WebSocket server.
//! - `utils`: error types and logging setup.

pub mod auth;
pub mod broker;
pub mod config;
pub mod connection;
pub mod transport;
pub mod utils;
