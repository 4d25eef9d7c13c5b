//! Credential validation
//!
//! The broker never issues or rotates credentials; it only asks a
//! [`CredentialValidator`] whether the access key a client presented is
//! currently valid and which subject it belongs to. Three validators ship
//! with the crate:
//! - [`JwtValidator`]: HS256 tokens signed by the issuing service
//! - [`AccessKeyStore`]: keys recorded in a local sled tree by the embedding
//!   application's issuance path
//! - [`StaticValidator`]: a fixed token table for development and tests

pub mod access_keys;
pub mod jwt;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AuthBackend, AuthSettings};
use crate::utils::error::{AuthError, ServerError};

pub use access_keys::{AccessKeyRecord, AccessKeyStore};
pub use jwt::{Claims, JwtValidator};

/// Identity of the user an access key was issued to.
pub type SubjectId = i64;

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Resolve `token` to its subject, or explain why it is not valid.
    async fn validate(&self, token: &str) -> Result<SubjectId, AuthError>;
}

/// Fixed token → subject table.
#[derive(Debug, Default, Clone)]
pub struct StaticValidator {
    tokens: HashMap<String, SubjectId>,
}

impl StaticValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, subject_id: SubjectId) -> Self {
        self.tokens.insert(token.into(), subject_id);
        self
    }
}

#[async_trait]
impl CredentialValidator for StaticValidator {
    async fn validate(&self, token: &str) -> Result<SubjectId, AuthError> {
        self.tokens
            .get(token)
            .copied()
            .ok_or(AuthError::InvalidToken)
    }
}

/// Build the validator selected by `auth.backend`.
pub fn from_settings(settings: &AuthSettings) -> Result<Arc<dyn CredentialValidator>, ServerError> {
    match settings.backend {
        AuthBackend::Jwt => Ok(Arc::new(JwtValidator::new(&settings.jwt_secret))),
        AuthBackend::AccessKeys => Ok(Arc::new(AccessKeyStore::open(&settings.access_key_db)?)),
    }
}
