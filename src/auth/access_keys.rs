//! Access key store backed by `sled`
//!
//! Mirrors an `access_keys` table: each issued key maps to the subject it was
//! issued to and the UNIX timestamp (seconds) at which it dies. Keys are
//! stored under the hex SHA-256 of the token so the raw key never touches
//! disk.
//!
//! The application that issues keys records them with [`AccessKeyStore::insert`];
//! the broker only reads. sled holds an exclusive lock on its directory, so
//! issuer and broker must share one process (and one `AccessKeyStore`).

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sled::{Db, Tree};
use tracing::{debug, error};

use crate::auth::{CredentialValidator, SubjectId};
use crate::utils::error::{AuthError, StoreError};

const TREE_NAME: &str = "access_keys";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AccessKeyRecord {
    pub subject_id: SubjectId,
    pub death_ts: i64,
}

impl AccessKeyRecord {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.death_ts <= now
    }
}

#[derive(Clone)]
pub struct AccessKeyStore {
    db: Db,
    tree: Tree,
}

impl AccessKeyStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let tree = db.open_tree(TREE_NAME)?;
        Ok(Self { db, tree })
    }

    fn storage_key(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Record an issued key.
    pub fn insert(&self, token: &str, subject_id: SubjectId, death_ts: i64) -> Result<(), StoreError> {
        let record = AccessKeyRecord {
            subject_id,
            death_ts,
        };
        let serialized = serde_json::to_vec(&record)?;
        self.tree
            .insert(Self::storage_key(token).as_bytes(), serialized)?;
        Ok(())
    }

    pub fn lookup(&self, token: &str) -> Result<Option<AccessKeyRecord>, StoreError> {
        match self.tree.get(Self::storage_key(token).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Forget a key. Returns `false` if it was unknown.
    pub fn revoke(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .tree
            .remove(Self::storage_key(token).as_bytes())?
            .is_some())
    }

    /// Remove every key past its death timestamp. Returns how many were
    /// removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now().timestamp();
        let mut expired = Vec::new();

        for entry in self.tree.iter() {
            let (key, value) = entry?;
            match serde_json::from_slice::<AccessKeyRecord>(&value) {
                Ok(record) if record.is_expired_at(now) => expired.push(key),
                Ok(_) => {}
                Err(e) => {
                    // unreadable records can never validate
                    error!("dropping corrupt access key record: {e}");
                    expired.push(key);
                }
            }
        }

        for key in &expired {
            self.tree.remove(key)?;
        }
        debug!(removed = expired.len(), "purged expired access keys");
        Ok(expired.len())
    }

    /// Block until pending writes reach disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[async_trait]
impl CredentialValidator for AccessKeyStore {
    async fn validate(&self, token: &str) -> Result<SubjectId, AuthError> {
        let record = self
            .lookup(token)
            .map_err(|e| AuthError::Backend(e.to_string()))?
            .ok_or(AuthError::InvalidToken)?;

        if record.is_expired_at(Utc::now().timestamp()) {
            return Err(AuthError::Expired);
        }
        Ok(record.subject_id)
    }
}

impl std::fmt::Debug for AccessKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeyStore")
            .field("db", &"sled::Db")
            .field("tree", &TREE_NAME)
            .finish()
    }
}
