//! Application roles and token validity

use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_DURATION_SECS: i64 = 60;
pub const MAX_DURATION_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_DURATION_SECS: i64 = 3600;

/// Role as the application names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppRole {
    Host,
    Cohost,
    Participant,
}

impl fmt::Display for AppRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppRole::Host => write!(f, "host"),
            AppRole::Cohost => write!(f, "cohost"),
            AppRole::Participant => write!(f, "participant"),
        }
    }
}

impl std::str::FromStr for AppRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "host" => Ok(AppRole::Host),
            "cohost" => Ok(AppRole::Cohost),
            "participant" => Ok(AppRole::Participant),
            _ => Err(format!(
                "invalid role: {}. Must be host, cohost, or participant",
                s
            )),
        }
    }
}

/// Role as the media service understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Publisher,
    Subscriber,
}

/// Host and cohost publish; participants only subscribe. Any finer
/// distinction between host and cohost is application logic.
pub fn resolve_role(role: AppRole) -> Role {
    match role {
        AppRole::Host | AppRole::Cohost => Role::Publisher,
        AppRole::Participant => Role::Subscriber,
    }
}

/// `now + duration`, rejecting durations outside
/// `[MIN_DURATION_SECS, MAX_DURATION_SECS]`
pub fn compute_expiry(now: u32, duration_secs: i64) -> Result<u32, BuildError> {
    if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration_secs) {
        return Err(BuildError::InvalidDuration(duration_secs));
    }
    // duration is bounded above, so only `now` can overflow
    now.checked_add(duration_secs as u32)
        .ok_or_else(|| BuildError::Internal(format!("expiry overflows u32 at now={}", now)))
}
