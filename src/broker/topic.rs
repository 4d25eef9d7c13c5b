//! Topic subscription index
//!
//! A `Topic` holds the subscribers of one chat, keyed by connection identity,
//! so duplicate subscriptions are a no-op and removal never depends on list
//! positions. `TopicIndex` owns every topic plus a reverse map from
//! connection to the chats it joined, which keeps `unsubscribe_all`
//! proportional to that connection's subscriptions.
//!
//! Invariant: a topic is present iff it has at least one subscriber. Topics
//! are created by the first `subscribe` and dropped by the same call that
//! removes their last subscriber.
//!
//! Concurrency note: callers must synchronize access to `TopicIndex` (the
//! broker keeps it behind its state lock together with the registry).

use std::collections::{HashMap, HashSet};

use crate::connection::{Connection, ConnectionId};

pub type ChatId = i64;

#[derive(Debug)]
pub struct Topic {
    pub id: ChatId,
    pub subscribers: HashMap<ConnectionId, Connection>,
}

impl Topic {
    /// Create an empty topic for the given chat.
    pub fn new(id: ChatId) -> Self {
        Self {
            id,
            subscribers: HashMap::new(),
        }
    }

    /// Add a subscriber. Returns `false` if it was already subscribed.
    pub fn subscribe(&mut self, connection: &Connection) -> bool {
        self.subscribers
            .insert(connection.id(), connection.clone())
            .is_none()
    }

    /// Remove a subscriber. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: &ConnectionId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TopicIndex {
    topics: HashMap<ChatId, Topic>,
    memberships: HashMap<ConnectionId, HashSet<ChatId>>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `connection` to `topic`, creating the topic on first use.
    /// Returns `false` when the subscription already existed.
    pub fn subscribe(&mut self, topic: ChatId, connection: &Connection) -> bool {
        let added = self
            .topics
            .entry(topic)
            .or_insert_with(|| Topic::new(topic))
            .subscribe(connection);

        if added {
            self.memberships
                .entry(connection.id())
                .or_default()
                .insert(topic);
        }
        added
    }

    /// Remove `id` from every topic it belongs to and drop topics left
    /// without subscribers. Returns the dropped topics.
    pub fn unsubscribe_all(&mut self, id: &ConnectionId) -> Vec<ChatId> {
        let Some(joined) = self.memberships.remove(id) else {
            return Vec::new();
        };

        let mut dropped = Vec::new();
        for chat_id in joined {
            if let Some(topic) = self.topics.get_mut(&chat_id) {
                topic.unsubscribe(id);
                if topic.is_empty() {
                    self.topics.remove(&chat_id);
                    dropped.push(chat_id);
                }
            }
        }
        dropped
    }

    /// Point-in-time copy of the subscribers of `topic`. Unknown topics
    /// yield an empty list.
    pub fn snapshot_subscribers(&self, topic: ChatId) -> Vec<Connection> {
        self.topics
            .get(&topic)
            .map(|t| t.subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_topic(&self, topic: ChatId) -> bool {
        self.topics.contains_key(&topic)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn subscriber_count(&self, topic: ChatId) -> usize {
        self.topics.get(&topic).map_or(0, |t| t.subscribers.len())
    }

    /// Chats `id` is currently subscribed to, in ascending order.
    pub fn topics_of(&self, id: &ConnectionId) -> Vec<ChatId> {
        let mut chats: Vec<ChatId> = self
            .memberships
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        chats.sort_unstable();
        chats
    }
}
