//! Connection registry
//!
//! Tracks every authenticated connection together with the subject it
//! authenticated as. A connection only enters the registry after the
//! authentication gate accepted its access key, so membership here is what
//! makes a connection addressable by the topic index.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::auth::SubjectId;
use crate::connection::{Connection, ConnectionId};

#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub subject_id: SubjectId,
    pub registered_at: DateTime<Utc>,
}

impl Registration {
    /// Time since the connection authenticated.
    pub fn connected_for(&self) -> TimeDelta {
        Utc::now() - self.registered_at
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: HashMap<ConnectionId, Registration>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Registering an id twice keeps the first entry and
    /// returns `false`.
    pub fn register(&mut self, connection: &Connection, subject_id: SubjectId) -> bool {
        if self.entries.contains_key(&connection.id()) {
            return false;
        }
        self.entries.insert(
            connection.id(),
            Registration {
                subject_id,
                registered_at: Utc::now(),
            },
        );
        true
    }

    /// Remove a connection. Absent ids are a no-op.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Registration> {
        self.entries.remove(id)
    }

    pub fn is_registered(&self, id: &ConnectionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn subject_of(&self, id: &ConnectionId) -> Option<SubjectId> {
        self.entries.get(id).map(|r| r.subject_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
