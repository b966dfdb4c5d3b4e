//! `006` access tokens
//!
//! Text form: `"006"` + app id (32 hex chars) + base64(content), where
//! content packs the HMAC-SHA256 signature, the CRC32 of the channel name,
//! the CRC32 of the uid string, and the packed [`Message`].
//!
//! The signature is keyed with the app certificate and covers
//! `app_id ++ channel ++ uid ++ message` byte for byte, so a verifier needs
//! the channel and uid the token was issued for.

use crate::config::{is_hex_id, Credentials};
use crate::error::{BuildError, VerifyError};
use crate::token::message::Message;
use crate::token::packing::{Packer, Unpacker};
use crate::token::privileges::{Privilege, PrivilegeSet};
use crate::token::service::bounded;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const VERSION: &str = "006";
pub const APP_ID_LEN: usize = 32;

/// Outer validity window the `006` envelope stamps into `ts`
pub const ENVELOPE_VALIDITY_SECS: u32 = 24 * 3600;

type HmacSha256 = Hmac<Sha256>;

/// A `006` token under construction
#[derive(Debug, Clone)]
pub struct AccessToken<'a> {
    credentials: &'a Credentials,
    channel: String,
    uid: String,
    issue_ts: u32,
    salt: u32,
    privileges: PrivilegeSet,
}

impl<'a> AccessToken<'a> {
    /// `uid` is the wire uid string: empty for uid 0, the decimal uid, or
    /// an account name
    pub fn new(
        credentials: &'a Credentials,
        channel: &str,
        uid: &str,
        issue_ts: u32,
        salt: u32,
    ) -> Self {
        Self {
            credentials,
            channel: channel.to_string(),
            uid: uid.to_string(),
            issue_ts,
            salt,
            privileges: PrivilegeSet::new(),
        }
    }

    pub fn add_privilege(&mut self, privilege: Privilege, expire_at: u32) {
        self.privileges.grant(privilege, expire_at);
    }

    pub fn message(&self) -> Message {
        Message::new(
            self.salt,
            self.issue_ts.saturating_add(ENVELOPE_VALIDITY_SECS),
            self.privileges.clone(),
        )
    }

    /// Sign and encode. Channel and uid are limited to
    /// [`MAX_FIELD_BYTES`](crate::token::service::MAX_FIELD_BYTES) each.
    pub fn build(&self) -> Result<String, BuildError> {
        bounded("channel", &self.channel)?;
        bounded("uid", &self.uid)?;

        let message = self.message().pack()?;
        let signature = sign(
            self.credentials.app_certificate().as_bytes(),
            self.credentials.app_id(),
            &self.channel,
            &self.uid,
            &message,
        )?;

        let mut content = Packer::with_capacity(2 + signature.len() + 8 + 2 + message.len());
        content.bytes(&signature)?;
        content
            .u32(crc32fast::hash(self.channel.as_bytes()))
            .u32(crc32fast::hash(self.uid.as_bytes()));
        content.bytes(&message)?;

        Ok(format!(
            "{}{}{}",
            VERSION,
            self.credentials.app_id(),
            STANDARD.encode(content.finish())
        ))
    }
}

fn mac_for(
    app_certificate: &[u8],
    app_id: &str,
    channel: &str,
    uid: &str,
    message: &[u8],
) -> Result<HmacSha256, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(app_certificate)?;
    mac.update(app_id.as_bytes());
    mac.update(channel.as_bytes());
    mac.update(uid.as_bytes());
    mac.update(message);
    Ok(mac)
}

fn sign(
    app_certificate: &[u8],
    app_id: &str,
    channel: &str,
    uid: &str,
    message: &[u8],
) -> Result<Vec<u8>, BuildError> {
    let mac = mac_for(app_certificate, app_id, channel, uid, message)
        .map_err(|e| BuildError::Internal(format!("hmac key: {}", e)))?;
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Structural decode of a `006` token, no signature check
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub app_id: String,
    pub signature: Vec<u8>,
    pub crc_channel: u32,
    pub crc_uid: u32,
    /// Message bytes exactly as carried; the signature covers these
    pub message_bytes: Vec<u8>,
    pub message: Message,
}

impl DecodedToken {
    pub fn parse(token: &str) -> Result<Self, VerifyError> {
        let rest = token
            .strip_prefix(VERSION)
            .ok_or_else(|| VerifyError::MalformedToken("unsupported version".to_string()))?;

        let app_id = rest
            .get(..APP_ID_LEN)
            .filter(|id| is_hex_id(id))
            .ok_or_else(|| VerifyError::MalformedToken("invalid app id".to_string()))?;

        let content = STANDARD
            .decode(&rest[APP_ID_LEN..])
            .map_err(|e| VerifyError::MalformedToken(format!("base64: {}", e)))?;

        let mut u = Unpacker::new(&content);
        let signature = u.bytes()?.to_vec();
        let crc_channel = u.u32()?;
        let crc_uid = u.u32()?;
        let message_bytes = u.bytes()?.to_vec();
        if !u.is_exhausted() {
            return Err(VerifyError::MalformedToken("trailing bytes".to_string()));
        }

        let message = Message::unpack(&message_bytes)?
            .ok_or_else(|| VerifyError::MalformedToken("unknown privilege".to_string()))?;

        Ok(Self {
            app_id: app_id.to_string(),
            signature,
            crc_channel,
            crc_uid,
            message_bytes,
            message,
        })
    }
}

/// A token that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub app_id: String,
    pub message: Message,
}

/// Verify a `006` token issued for `channel` / `uid` at time `now`
pub fn verify(
    token: &str,
    app_certificate: &str,
    channel: &str,
    uid: &str,
    now: u32,
) -> Result<VerifiedToken, VerifyError> {
    let decoded = DecodedToken::parse(token)?;

    if decoded.crc_channel != crc32fast::hash(channel.as_bytes())
        || decoded.crc_uid != crc32fast::hash(uid.as_bytes())
    {
        return Err(VerifyError::BadSignature);
    }

    let mac = mac_for(
        app_certificate.as_bytes(),
        &decoded.app_id,
        channel,
        uid,
        &decoded.message_bytes,
    )
    .map_err(|_| VerifyError::BadSignature)?;
    mac.verify_slice(&decoded.signature)
        .map_err(|_| VerifyError::BadSignature)?;

    let message = decoded.message;
    if message.ts() < now {
        return Err(VerifyError::Expired {
            expired_at: message.ts(),
            now,
        });
    }
    if let Some((privilege, expired_at)) = message.privileges().first_expired(now) {
        return Err(VerifyError::PrivilegeExpired {
            privilege,
            expired_at,
            now,
        });
    }

    Ok(VerifiedToken {
        app_id: decoded.app_id,
        message,
    })
}
