//! Online session scheduling behind single-use form tokens
//!
//! A form token is created out of band (see the `form-token` command),
//! opened once to prefill the form, and consumed when the form is
//! submitted. Submitting stores a session record, uploads its cover file
//! and marks the token used.

mod scheduler;

pub use scheduler::{CoverUpload, FormPrefill, ScheduleRequest, ScheduledSession, Scheduler};

use crate::storage::StorageError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tokens shorter than this are rejected without a lookup
pub const MIN_FORM_TOKEN_LEN: usize = 12;

const MAX_SLUG_LEN: usize = 40;

/// Errors from the scheduling flow
#[derive(Debug, Clone, Error)]
pub enum ScheduleError {
    #[error("invalid form token")]
    InvalidToken,

    #[error("form token not found")]
    TokenNotFound,

    #[error("form token already used")]
    TokenUsed,

    #[error("form token expired")]
    TokenExpired,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormTokenStatus {
    #[default]
    Pending,
    Used,
}

/// Form token document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormToken {
    #[serde(default)]
    pub status: FormTokenStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pref_subject: String,
    #[serde(default)]
    pub pref_date: String,
    #[serde(default)]
    pub pref_time: String,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl FormToken {
    /// Usable at `now`: not used and not past `expire_at`
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        if self.status == FormTokenStatus::Used {
            return Err(ScheduleError::TokenUsed);
        }
        match self.expire_at {
            Some(expire_at) if now > expire_at => Err(ScheduleError::TokenExpired),
            _ => Ok(()),
        }
    }
}

/// Team lists per application role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRoles {
    pub host_teams: Vec<String>,
    pub cohost_teams: Vec<String>,
    pub participant: Vec<String>,
}

impl SessionRoles {
    /// Everyone else joins as participant
    pub fn new(host: &str, cohost: Option<&str>) -> Self {
        Self {
            host_teams: vec![host.to_string()],
            cohost_teams: cohost.map(|c| vec![c.to_string()]).unwrap_or_default(),
            participant: vec!["*".to_string()],
        }
    }
}

/// Scheduled session document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub time: String,
    pub timezone: String,
    pub subject: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by_email: String,
    pub roles: SessionRoles,
    pub channel_name: String,
    pub form_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cover_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_updated_at: Option<DateTime<Utc>>,
}

/// Random URL-safe form token
pub fn generate_form_token() -> String {
    let mut bytes = [0u8; 18];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Drop all whitespace and uppercase: `" ops team "` -> `"OPSTEAM"`
pub fn normalize_team(team: &str) -> String {
    team.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Lowercase ASCII slug; runs of anything else collapse to one `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.trim().chars().flat_map(char::to_uppercase) {
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "meeting".to_string()
    } else {
        slug
    }
}

/// `{prefix}-{yyyymmdd}-{hhmm}-{slug}` with the slug cut to 40 bytes
pub fn make_session_id(prefix: &str, date: &str, time: &str, subject: &str) -> String {
    let slug = slugify(subject);
    let slug = &slug[..slug.len().min(MAX_SLUG_LEN)];
    format!(
        "{}-{}-{}-{}",
        prefix,
        date.replace('-', ""),
        time.replace(':', ""),
        slug
    )
}

fn has_shape(s: &str, shape: &str) -> bool {
    s.len() == shape.len()
        && s.bytes().zip(shape.bytes()).all(|(c, p)| match p {
            b'9' => c.is_ascii_digit(),
            _ => c == p,
        })
}

/// `YYYY-MM-DD` naming a real calendar day
pub fn validate_date(date: &str) -> Result<NaiveDate, ScheduleError> {
    let invalid = || ScheduleError::Validation("invalid date (use YYYY-MM-DD)".to_string());
    if !has_shape(date, "9999-99-99") {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())
}

/// `HH:MM` on a 24-hour clock
pub fn validate_time(time: &str) -> Result<NaiveTime, ScheduleError> {
    let invalid = || ScheduleError::Validation("invalid time (use HH:MM)".to_string());
    if !has_shape(time, "99:99") {
        return Err(invalid());
    }
    NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| invalid())
}
