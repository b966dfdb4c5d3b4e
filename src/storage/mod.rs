//! Storage backends for the scheduling form
//!
//! - Postgres: JSONB documents for form tokens and sessions
//! - Memory: `DashMap` documents and objects, for tests and single-node runs
//! - Files: cover uploads written under a local directory

mod files;
mod memory;
mod postgres;

pub use files::FileObjectStore;
pub use memory::{MemoryStore, StoredObject};
pub use postgres::PostgresStore;

use crate::scheduling::{FormToken, SessionRecord};
pub use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// A conditional write found the record in the wrong state
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Single-use form tokens, keyed by the token string
#[async_trait]
pub trait FormTokenStore: Send + Sync {
    async fn get_form_token(&self, token: &str) -> Result<Option<FormToken>, StorageError>;

    /// Insert or replace
    async fn put_form_token(&self, token: &str, form: &FormToken) -> Result<(), StorageError>;

    /// Flag a pending token used by `session_id`
    ///
    /// Atomic compare-and-set: `Conflict` if the token is already used,
    /// `NotFound` if it does not exist.
    async fn mark_used(
        &self,
        token: &str,
        session_id: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Return a token claimed by `session_id` to pending
    async fn release(&self, token: &str, session_id: &str) -> Result<(), StorageError>;
}

/// Scheduled sessions, keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert, or merge over an existing record with the same id
    async fn upsert_session(&self, session: &SessionRecord) -> Result<(), StorageError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError>;

    async fn set_cover_files(
        &self,
        session_id: &str,
        cover_files: &[String],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Blob storage for uploaded files
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, content_type: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Rejects absolute keys and `.`/`..` segments
pub(crate) fn check_object_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
