//! Process configuration
//!
//! Everything here is built once at startup and passed down explicitly.

use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub const APP_ID_ENV: &str = "ROOMKEY_APP_ID";
pub const APP_CERTIFICATE_ENV: &str = "ROOMKEY_APP_CERTIFICATE";

/// 32 ASCII hex characters
pub fn is_hex_id(s: &str) -> bool {
    s.len() == 32 && hex::decode(s).is_ok()
}

/// App id and certificate pair
///
/// The certificate is the HMAC key. It never leaves the process and is
/// redacted from `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    app_id: String,
    app_certificate: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, app_certificate: impl Into<String>) -> Result<Self, BuildError> {
        let app_id = app_id.into();
        let app_certificate = app_certificate.into();

        if !is_hex_id(&app_id) {
            return Err(BuildError::InvalidCredentials(
                "app id must be 32 hex characters".to_string(),
            ));
        }
        if app_certificate.is_empty() {
            return Err(BuildError::InvalidCredentials(
                "app certificate is empty".to_string(),
            ));
        }

        Ok(Self {
            app_id,
            app_certificate,
        })
    }

    pub fn from_env() -> Result<Self, BuildError> {
        let app_id = std::env::var(APP_ID_ENV)
            .map_err(|_| BuildError::InvalidCredentials(format!("{} not set", APP_ID_ENV)))?;
        let app_certificate = std::env::var(APP_CERTIFICATE_ENV).map_err(|_| {
            BuildError::InvalidCredentials(format!("{} not set", APP_CERTIFICATE_ENV))
        })?;
        Self::new(app_id, app_certificate)
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub(crate) fn app_certificate(&self) -> &str {
        &self.app_certificate
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"[REDACTED]")
            .finish()
    }
}

/// Token wire format to issue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenScheme {
    #[default]
    #[serde(rename = "006")]
    V006,
    #[serde(rename = "007")]
    V007,
}

impl FromStr for TokenScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "006" => Ok(TokenScheme::V006),
            "007" => Ok(TokenScheme::V007),
            other => Err(format!("unknown token scheme '{}': expected 006 or 007", other)),
        }
    }
}

impl fmt::Display for TokenScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenScheme::V006 => write!(f, "006"),
            TokenScheme::V007 => write!(f, "007"),
        }
    }
}

/// Wire format per service
///
/// Defaults to `007` media tokens and `006` signaling tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSchemes {
    pub media: TokenScheme,
    pub signaling: TokenScheme,
}

impl TokenSchemes {
    pub fn new(media: TokenScheme, signaling: TokenScheme) -> Self {
        Self { media, signaling }
    }

    /// Same format for both services
    pub fn uniform(scheme: TokenScheme) -> Self {
        Self::new(scheme, scheme)
    }

    pub fn needs_hex_certificate(&self) -> bool {
        self.media == TokenScheme::V007 || self.signaling == TokenScheme::V007
    }
}

impl Default for TokenSchemes {
    fn default() -> Self {
        Self::new(TokenScheme::V007, TokenScheme::V006)
    }
}

impl fmt::Display for TokenSchemes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media={} signaling={}", self.media, self.signaling)
    }
}

/// Settings for the scheduling form
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time zone label stored on session records
    pub timezone: String,
    /// Object key prefix for uploaded covers
    pub cover_prefix: String,
    /// Prefix of generated session ids
    pub session_prefix: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Sao_Paulo".to_string(),
            cover_prefix: "online".to_string(),
            session_prefix: "session".to_string(),
        }
    }
}

/// Everything `serve` needs
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub credentials: Credentials,
    pub schemes: TokenSchemes,
    /// When set, requests must carry a matching `api_key`
    pub api_key: Option<String>,
    /// Postgres URL; in-memory stores when absent
    pub database_url: Option<String>,
    pub upload_dir: PathBuf,
    pub schedule: ScheduleConfig,
}
