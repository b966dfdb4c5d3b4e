//! In-memory storage backend

use crate::scheduling::{FormToken, FormTokenStatus, SessionRecord};
use crate::storage::{check_object_key, FormTokenStore, ObjectStore, SessionStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// An uploaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Form tokens, sessions and objects held in concurrent maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    form_tokens: DashMap<String, FormToken>,
    sessions: DashMap<String, SessionRecord>,
    objects: DashMap<String, StoredObject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|o| o.value().clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[async_trait]
impl FormTokenStore for MemoryStore {
    async fn get_form_token(&self, token: &str) -> Result<Option<FormToken>, StorageError> {
        Ok(self.form_tokens.get(token).map(|t| t.value().clone()))
    }

    async fn put_form_token(&self, token: &str, form: &FormToken) -> Result<(), StorageError> {
        self.form_tokens.insert(token.to_string(), form.clone());
        Ok(())
    }

    async fn mark_used(
        &self,
        token: &str,
        session_id: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .form_tokens
            .get_mut(token)
            .ok_or_else(|| StorageError::NotFound(format!("form token {}", token)))?;
        if entry.status == FormTokenStatus::Used {
            return Err(StorageError::Conflict(format!("form token {} already used", token)));
        }
        entry.status = FormTokenStatus::Used;
        entry.used_at = Some(used_at);
        entry.session_id = Some(session_id.to_string());
        Ok(())
    }

    async fn release(&self, token: &str, session_id: &str) -> Result<(), StorageError> {
        if let Some(mut entry) = self.form_tokens.get_mut(token) {
            if entry.session_id.as_deref() == Some(session_id) {
                entry.status = FormTokenStatus::Pending;
                entry.used_at = None;
                entry.session_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn upsert_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        self.sessions
            .entry(session.session_id.clone())
            .and_modify(|existing| {
                let cover_files = std::mem::take(&mut existing.cover_files);
                let cover_updated_at = existing.cover_updated_at;
                *existing = session.clone();
                if existing.cover_files.is_empty() {
                    existing.cover_files = cover_files;
                    existing.cover_updated_at = cover_updated_at;
                }
            })
            .or_insert_with(|| session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.sessions.get(session_id).map(|s| s.value().clone()))
    }

    async fn set_cover_files(
        &self,
        session_id: &str,
        cover_files: &[String],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StorageError::NotFound(format!("session {}", session_id)))?;
        entry.cover_files = cover_files.to_vec();
        entry.cover_updated_at = Some(updated_at);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, key: &str, content_type: &str, data: &[u8]) -> Result<(), StorageError> {
        check_object_key(key)?;
        self.objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                data: data.to_vec(),
            },
        );
        Ok(())
    }
}
