//! Channel names and identities
//!
//! Media channel names are 1..=64 bytes from the alphabet
//! `a-z A-Z 0-9 space ! # $ % & ( ) + - : ; < = . > ? @ [ ] ^ _ { | } ~ ,`.
//! Accounts (signaling identities and string uids) are 1..=64 bytes of
//! printable text. Both are trimmed before validation.

use crate::error::BuildError;
use serde::Serialize;
use std::fmt;

pub const MAX_CHANNEL_BYTES: usize = 64;
pub const MAX_ACCOUNT_BYTES: usize = 64;

fn is_valid_channel_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || " !#$%&()+-:;<=.>?@[]^_{|}~,".contains(c)
}

/// A validated media channel name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn parse(name: &str) -> Result<Self, BuildError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BuildError::InvalidChannel(
                "channel name cannot be empty".to_string(),
            ));
        }
        if name.len() > MAX_CHANNEL_BYTES {
            return Err(BuildError::InvalidChannel(format!(
                "channel name is {} bytes, limit {}",
                name.len(),
                MAX_CHANNEL_BYTES
            )));
        }
        if let Some(c) = name.chars().find(|c| !is_valid_channel_char(*c)) {
            return Err(BuildError::InvalidChannel(format!(
                "character {:?} not allowed in channel name",
                c
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated string identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn parse(account: &str) -> Result<Self, BuildError> {
        let account = account.trim();
        if account.is_empty() {
            return Err(BuildError::InvalidIdentity(
                "account cannot be empty".to_string(),
            ));
        }
        if account.len() > MAX_ACCOUNT_BYTES {
            return Err(BuildError::InvalidIdentity(format!(
                "account is {} bytes, limit {}",
                account.len(),
                MAX_ACCOUNT_BYTES
            )));
        }
        if account.chars().any(char::is_control) {
            return Err(BuildError::InvalidIdentity(
                "account contains control characters".to_string(),
            ));
        }
        Ok(Self(account.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a media token is issued to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Uid(u32),
    Account(Account),
}

impl Identity {
    /// Accepts the signed integers request bodies carry
    pub fn from_uid(uid: i64) -> Result<Self, BuildError> {
        u32::try_from(uid)
            .map(Identity::Uid)
            .map_err(|_| BuildError::InvalidIdentity(format!("uid {} out of range 0..=4294967295", uid)))
    }

    /// The uid string both token formats sign: empty for uid 0
    pub fn wire_uid(&self) -> String {
        match self {
            Identity::Uid(0) => String::new(),
            Identity::Uid(uid) => uid.to_string(),
            Identity::Account(account) => account.as_str().to_string(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Uid(uid) => write!(f, "uid:{}", uid),
            Identity::Account(account) => write!(f, "account:{}", account),
        }
    }
}
