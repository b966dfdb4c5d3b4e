use crate::config::ScheduleConfig;
use crate::scheduling::{
    make_session_id, normalize_team, validate_date, validate_time, FormToken, ScheduleError,
    SessionRecord, SessionRoles, MIN_FORM_TOKEN_LEN,
};
use crate::storage::{FormTokenStore, ObjectStore, SessionStore, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Uploaded cover file
#[derive(Debug, Clone)]
pub struct CoverUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Submitted form fields
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub token: String,
    pub date: String,
    pub time: String,
    pub subject: String,
    pub host: String,
    pub cohost: Option<String>,
    pub cover: CoverUpload,
}

/// Values to prefill the form with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormPrefill {
    pub token: String,
    pub pref_subject: String,
    pub pref_date: String,
    pub pref_time: String,
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledSession {
    pub session_id: String,
    pub date: String,
    pub time: String,
    pub subject: String,
    pub host: String,
    pub cohost: String,
}

/// Runs the form flow against the configured stores
#[derive(Clone)]
pub struct Scheduler {
    tokens: Arc<dyn FormTokenStore>,
    sessions: Arc<dyn SessionStore>,
    objects: Arc<dyn ObjectStore>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(
        tokens: Arc<dyn FormTokenStore>,
        sessions: Arc<dyn SessionStore>,
        objects: Arc<dyn ObjectStore>,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            tokens,
            sessions,
            objects,
            config,
        }
    }

    /// Look up `token` and check it is still usable
    pub async fn validate_token(&self, token: &str, now: DateTime<Utc>) -> Result<FormToken, ScheduleError> {
        if token.len() < MIN_FORM_TOKEN_LEN {
            return Err(ScheduleError::InvalidToken);
        }
        let form = self
            .tokens
            .get_form_token(token)
            .await?
            .ok_or(ScheduleError::TokenNotFound)?;
        form.check(now)?;
        Ok(form)
    }

    pub async fn prefill(&self, token: &str, now: DateTime<Utc>) -> Result<FormPrefill, ScheduleError> {
        let form = self.validate_token(token, now).await?;
        Ok(FormPrefill {
            token: token.to_string(),
            pref_subject: form.pref_subject,
            pref_date: form.pref_date,
            pref_time: form.pref_time,
        })
    }

    /// Validate the submission, consume the token, then store the session
    /// and its cover. The token is released again if storing fails.
    pub async fn schedule(
        &self,
        request: ScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<ScheduledSession, ScheduleError> {
        let form = self.validate_token(&request.token, now).await?;

        let host = normalize_team(&request.host);
        if host.is_empty() {
            return Err(ScheduleError::Validation("host is required".to_string()));
        }
        let cohost = request
            .cohost
            .as_deref()
            .map(normalize_team)
            .unwrap_or_default();

        let date = request.date.trim();
        let time = request.time.trim();
        validate_date(date)?;
        validate_time(time)?;

        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(ScheduleError::Validation("subject is required".to_string()));
        }
        let cover_name = cover_basename(&request.cover.filename)
            .ok_or_else(|| ScheduleError::Validation("invalid cover file".to_string()))?;

        let session_id = make_session_id(&self.config.session_prefix, date, time, subject);
        let record = SessionRecord {
            session_id: session_id.clone(),
            kind: "online".to_string(),
            date: date.to_string(),
            time: time.to_string(),
            timezone: self.config.timezone.clone(),
            subject: subject.to_string(),
            status: "scheduled".to_string(),
            created_at: now,
            created_by_email: form.sender_email,
            roles: SessionRoles::new(&host, (!cohost.is_empty()).then_some(cohost.as_str())),
            channel_name: session_id.clone(),
            form_token: request.token.clone(),
            cover_files: Vec::new(),
            cover_updated_at: None,
        };

        self.claim(&request.token, &session_id, now).await?;
        if let Err(e) = self.store_session(&record, &request.cover, cover_name).await {
            if let Err(release_err) = self.tokens.release(&request.token, &session_id).await {
                warn!(session_id = %session_id, error = %release_err, "Failed to release form token");
            }
            return Err(e);
        }

        info!(session_id = %session_id, host = %host, "Scheduled session");

        Ok(ScheduledSession {
            session_id,
            date: date.to_string(),
            time: time.to_string(),
            subject: subject.to_string(),
            host,
            cohost,
        })
    }

    /// Compare-and-set the token to used before any write
    async fn claim(&self, token: &str, session_id: &str, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        match self.tokens.mark_used(token, session_id, now).await {
            Ok(()) => Ok(()),
            Err(StorageError::Conflict(_)) => Err(ScheduleError::TokenUsed),
            Err(StorageError::NotFound(_)) => Err(ScheduleError::TokenNotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_session(
        &self,
        record: &SessionRecord,
        cover: &CoverUpload,
        cover_name: &str,
    ) -> Result<(), ScheduleError> {
        self.sessions.upsert_session(record).await?;

        let cover_key = format!(
            "{}/{}/cover/{}",
            self.config.cover_prefix, record.session_id, cover_name
        );
        let content_type = cover
            .content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        self.objects.put_object(&cover_key, content_type, &cover.data).await?;
        self.sessions
            .set_cover_files(&record.session_id, std::slice::from_ref(&cover_key), record.created_at)
            .await?;
        Ok(())
    }
}

/// Last path segment of an uploaded filename
fn cover_basename(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_basename() {
        assert_eq!(cover_basename("cover.png"), Some("cover.png"));
        assert_eq!(cover_basename("C:\\Users\\me\\cover.png"), Some("cover.png"));
        assert_eq!(cover_basename("../../cover.png"), Some("cover.png"));
        assert_eq!(cover_basename(""), None);
        assert_eq!(cover_basename("dir/"), None);
        assert_eq!(cover_basename(".."), None);
    }
}
