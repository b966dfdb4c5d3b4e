//! PostgreSQL storage backend
//!
//! Form tokens and sessions are stored as JSONB documents keyed by id.
//! Writes merge into the existing document with `||`.

use crate::scheduling::{FormToken, SessionRecord};
use crate::storage::{FormTokenStore, SessionStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Postgres-backed form token and session store
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Connect using a `postgres://` URL and create tables if missing
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let mut cfg = Config::new();
        cfg.url = Some(url.to_string());

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;

        Ok(store)
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        let client = self.client().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS roomkey_form_tokens (
                    id TEXT PRIMARY KEY,
                    doc JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE TABLE IF NOT EXISTS roomkey_sessions (
                    id TEXT PRIMARY KEY,
                    doc JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX IF NOT EXISTS roomkey_sessions_form_token_idx
                    ON roomkey_sessions ((doc->>'formToken'));
                "#,
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        info!("Database schema initialized");
        Ok(())
    }

    async fn load<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<Option<T>, StorageError> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", table);
        let client = self.client().await?;
        let row = client
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        row.map(|row| {
            let doc: serde_json::Value = row.get(0);
            serde_json::from_value(doc).map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn merge<T: Serialize + Sync>(&self, table: &str, id: &str, doc: &T) -> Result<(), StorageError> {
        let doc = to_json(doc)?;
        let sql = format!(
            "INSERT INTO {t} (id, doc) VALUES ($1, $2::jsonb)
             ON CONFLICT (id) DO UPDATE SET doc = {t}.doc || EXCLUDED.doc, updated_at = NOW()",
            t = table
        );
        let client = self.client().await?;
        client
            .execute(sql.as_str(), &[&id, &doc])
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    async fn patch(&self, table: &str, id: &str, patch: serde_json::Value) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {} SET doc = doc || $2::jsonb, updated_at = NOW() WHERE id = $1",
            table
        );
        let client = self.client().await?;
        let updated = client
            .execute(sql.as_str(), &[&id, &patch])
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("{} {}", table, id)));
        }
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, StorageError> {
    serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl FormTokenStore for PostgresStore {
    async fn get_form_token(&self, token: &str) -> Result<Option<FormToken>, StorageError> {
        self.load("roomkey_form_tokens", token).await
    }

    async fn put_form_token(&self, token: &str, form: &FormToken) -> Result<(), StorageError> {
        let doc = to_json(form)?;
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO roomkey_form_tokens (id, doc) VALUES ($1, $2::jsonb)
                 ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()",
                &[&token, &doc],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!("Stored form token");
        Ok(())
    }

    async fn mark_used(
        &self,
        token: &str,
        session_id: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let patch = serde_json::json!({
            "status": "used",
            "usedAt": used_at,
            "sessionId": session_id,
        });
        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE roomkey_form_tokens SET doc = doc || $2::jsonb, updated_at = NOW()
                 WHERE id = $1 AND doc->>'status' IS DISTINCT FROM 'used'",
                &[&token, &patch],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if updated == 0 {
            return match self.get_form_token(token).await? {
                Some(_) => Err(StorageError::Conflict(format!("form token {} already used", token))),
                None => Err(StorageError::NotFound(format!("form token {}", token))),
            };
        }
        Ok(())
    }

    async fn release(&self, token: &str, session_id: &str) -> Result<(), StorageError> {
        let client = self.client().await?;
        client
            .execute(
                "UPDATE roomkey_form_tokens
                 SET doc = (doc - 'usedAt' - 'sessionId') || '{\"status\": \"pending\"}'::jsonb,
                     updated_at = NOW()
                 WHERE id = $1 AND doc->>'sessionId' = $2",
                &[&token, &session_id],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!(session_id, "Released form token");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn upsert_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        self.merge("roomkey_sessions", &session.session_id, session).await?;
        debug!(session_id = %session.session_id, "Upserted session");
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        self.load("roomkey_sessions", session_id).await
    }

    async fn set_cover_files(
        &self,
        session_id: &str,
        cover_files: &[String],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let patch = serde_json::json!({
            "coverFiles": cover_files,
            "coverUpdatedAt": updated_at,
        });
        self.patch("roomkey_sessions", session_id, patch).await
    }
}
