//! Broker engine
//!
//! This module contains the process-scoped broker responsible for:
//! - tracking authenticated connections (the registry)
//! - managing chat topics and their subscriber sets (the topic index)
//! - tearing connections down exactly once, whatever ended them
//!
//! Concurrency and usage notes:
//! - The registry and the index share one `std::sync::Mutex`, so a cleanup
//!   removes a connection from both in a single step and no snapshot can
//!   observe it half-removed. The lock is never held across an `.await`.
//! - `Broker` is meant to be shared as `Arc<Broker>` between the transport
//!   tasks and upstream publishers; every method takes `&self`.
//! - Event fan-out lives in `dispatcher.rs`; it only takes the lock to
//!   snapshot subscribers and to clean up subscribers it failed to reach.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::auth::SubjectId;
use crate::broker::registry::ConnectionRegistry;
use crate::broker::topic::{ChatId, TopicIndex};
use crate::config::BrokerSettings;
use crate::connection::{Connection, ConnectionId};
use crate::utils::error::BrokerError;

#[derive(Debug, Default)]
struct State {
    registry: ConnectionRegistry,
    index: TopicIndex,
}

#[derive(Debug)]
pub struct Broker {
    state: Mutex<State>,
    max_connections: usize,
    delivery_timeout: Duration,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(&BrokerSettings::default())
    }
}

impl Broker {
    pub fn new(settings: &BrokerSettings) -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_connections: settings.max_connections,
            delivery_timeout: Duration::from_millis(settings.delivery_timeout_ms),
        }
    }

    // Every mutation under this lock is a plain map operation, so a
    // poisoned guard still holds consistent state.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upper bound for handing one frame to one subscriber.
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    /// Register an authenticated connection.
    ///
    /// Fails if the connection was already cleaned up (for example its
    /// writer died during the handshake) or the connection limit is reached.
    pub fn register(
        &self,
        connection: &Connection,
        subject_id: SubjectId,
    ) -> Result<(), BrokerError> {
        let mut state = self.state();

        if connection.is_closed() {
            return Err(BrokerError::Closed(connection.id()));
        }
        if state.registry.is_registered(&connection.id()) {
            return Ok(());
        }
        if state.registry.len() >= self.max_connections {
            return Err(BrokerError::CapacityReached(self.max_connections));
        }

        state.registry.register(connection, subject_id);
        drop(state);

        info!(connection = %connection.id(), subject_id, "connection registered");
        Ok(())
    }

    pub fn is_registered(&self, id: &ConnectionId) -> bool {
        self.state().registry.is_registered(id)
    }

    pub fn subject_of(&self, id: &ConnectionId) -> Option<SubjectId> {
        self.state().registry.subject_of(id)
    }

    pub fn connection_count(&self) -> usize {
        self.state().registry.len()
    }

    /// Subscribe a registered connection to a chat. Automatically creates
    /// the topic if it doesn't exist. Returns `false` for a repeated
    /// subscription.
    pub fn subscribe(&self, topic: ChatId, connection: &Connection) -> Result<bool, BrokerError> {
        let mut state = self.state();

        if !state.registry.is_registered(&connection.id()) {
            return Err(BrokerError::NotRegistered(connection.id()));
        }
        let added = state.index.subscribe(topic, connection);
        drop(state);

        debug!(connection = %connection.id(), chat_id = topic, added, "subscribe");
        Ok(added)
    }

    /// Point-in-time copy of a chat's subscribers, safe to iterate without
    /// the lock.
    pub fn snapshot_subscribers(&self, topic: ChatId) -> Vec<Connection> {
        self.state().index.snapshot_subscribers(topic)
    }

    pub fn contains_topic(&self, topic: ChatId) -> bool {
        self.state().index.contains_topic(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.state().index.topic_count()
    }

    pub fn subscriber_count(&self, topic: ChatId) -> usize {
        self.state().index.subscriber_count(topic)
    }

    pub fn topics_of(&self, id: &ConnectionId) -> Vec<ChatId> {
        self.state().index.topics_of(id)
    }

    /// Tear a connection down: set its closed flag, drop it from the
    /// registry and from every topic, and delete topics it leaves empty.
    ///
    /// Every termination path calls this (client close, read or write error,
    /// failed delivery, rejected handshake). Only the first call for a
    /// connection does any work and returns `true`. The closed flag is
    /// flipped under the same lock the snapshot takes, so once this returns
    /// no later snapshot contains the connection.
    pub fn on_connection_closed(&self, connection: &Connection) -> bool {
        let id = connection.id();

        let (registration, dropped_topics) = {
            let mut state = self.state();
            if connection.mark_closed() {
                return false;
            }
            let registration = state.registry.unregister(&id);
            let dropped_topics = state.index.unsubscribe_all(&id);
            (registration, dropped_topics)
        };

        match registration {
            Some(registration) => info!(
                connection = %id,
                subject_id = registration.subject_id,
                connected_ms = registration.connected_for().num_milliseconds(),
                ?dropped_topics,
                "cleaned up connection"
            ),
            None => debug!(connection = %id, "closed before registration"),
        }
        true
    }
}
