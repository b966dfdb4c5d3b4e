//! Token issuing: validation, role/validity mapping, builder dispatch
//!
//! All input is validated before any signing happens.

use crate::builders::{MediaGrant, MediaTokenBuilder, SignalingBuilder, SignalingGrant, SigningLibrary};
use crate::channels::{Account, ChannelName, Identity};
use crate::config::{is_hex_id, Credentials, TokenSchemes};
use crate::error::BuildError;
use crate::roles::{compute_expiry, resolve_role, AppRole};
use crate::token::random_salt;
use std::sync::Arc;
use tracing::debug;

/// A media token and the facts it was built from
#[derive(Debug, Clone)]
pub struct IssuedMedia {
    pub token: String,
    pub expire_at: u32,
    pub now: u32,
    pub channel: ChannelName,
    pub uid: u32,
    pub role: AppRole,
}

#[derive(Debug, Clone)]
pub struct IssuedSignaling {
    pub token: String,
    pub expire_at: u32,
    pub now: u32,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub struct IssuedCombined {
    pub media: IssuedMedia,
    pub signaling: IssuedSignaling,
}

/// Stateless token issuer shared by every request
#[derive(Debug, Clone)]
pub struct TokenService {
    credentials: Arc<Credentials>,
    schemes: TokenSchemes,
    media: MediaTokenBuilder,
    signaling: SignalingBuilder,
}

impl TokenService {
    /// Resolves the signaling entry point now; a library without one is a
    /// startup error, as is a non-hex certificate when either service
    /// issues `007`
    pub fn new(credentials: Credentials, schemes: TokenSchemes) -> Result<Self, BuildError> {
        Self::with_library(credentials, schemes, &SigningLibrary::for_scheme(schemes.signaling))
    }

    /// Signaling tokens come from `library` instead of the built-in one
    pub fn with_library(
        credentials: Credentials,
        schemes: TokenSchemes,
        library: &SigningLibrary,
    ) -> Result<Self, BuildError> {
        if schemes.needs_hex_certificate() && !is_hex_id(credentials.app_certificate()) {
            return Err(BuildError::InvalidCredentials(
                "007 tokens need a 32 hex-character app certificate".to_string(),
            ));
        }
        let signaling = SignalingBuilder::resolve(library)?;
        Ok(Self {
            credentials: Arc::new(credentials),
            schemes,
            media: MediaTokenBuilder::new(schemes.media),
            signaling,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn schemes(&self) -> TokenSchemes {
        self.schemes
    }

    /// The entry point resolved at construction
    pub fn signaling_builder(&self) -> &SignalingBuilder {
        &self.signaling
    }

    /// Media token valid for `expire_seconds` from `now`
    pub fn issue_media(
        &self,
        channel: &str,
        uid: i64,
        role: AppRole,
        expire_seconds: i64,
        now: u32,
    ) -> Result<IssuedMedia, BuildError> {
        let (grant, uid) = self.media_grant(channel, uid, role, expire_seconds, now)?;
        self.sign_media(grant, uid, role, now)
    }

    /// Signaling token for `user_account`, or the uid in decimal
    pub fn issue_signaling(
        &self,
        user_account: Option<&str>,
        uid: i64,
        expire_seconds: i64,
        now: u32,
    ) -> Result<IssuedSignaling, BuildError> {
        let grant = self.signaling_grant(user_account, uid, expire_seconds, now)?;
        self.sign_signaling(grant, now)
    }

    /// Both tokens, sharing one expiry
    pub fn issue_combined(
        &self,
        channel: &str,
        uid: i64,
        role: AppRole,
        expire_seconds: i64,
        user_account: Option<&str>,
        now: u32,
    ) -> Result<IssuedCombined, BuildError> {
        let (media_grant, uid32) = self.media_grant(channel, uid, role, expire_seconds, now)?;
        let signaling_grant = self.signaling_grant(user_account, uid, expire_seconds, now)?;

        Ok(IssuedCombined {
            media: self.sign_media(media_grant, uid32, role, now)?,
            signaling: self.sign_signaling(signaling_grant, now)?,
        })
    }

    fn media_grant(
        &self,
        channel: &str,
        uid: i64,
        role: AppRole,
        expire_seconds: i64,
        now: u32,
    ) -> Result<(MediaGrant, u32), BuildError> {
        let channel = ChannelName::parse(channel)?;
        let identity = Identity::from_uid(uid)?;
        let expire_at = compute_expiry(now, expire_seconds)?;
        let uid = match identity {
            Identity::Uid(uid) => uid,
            Identity::Account(_) => 0,
        };

        let grant = MediaGrant {
            channel,
            identity,
            role: resolve_role(role),
            privilege_expire_at: expire_at,
            token_expire_at: expire_at,
        };
        Ok((grant, uid))
    }

    fn signaling_grant(
        &self,
        user_account: Option<&str>,
        uid: i64,
        expire_seconds: i64,
        now: u32,
    ) -> Result<SignalingGrant, BuildError> {
        Identity::from_uid(uid)?;
        let account = match user_account {
            Some(account) => Account::parse(account)?,
            None => Account::parse(&uid.to_string())?,
        };
        let privilege_expire_at = compute_expiry(now, expire_seconds)?;
        Ok(SignalingGrant {
            account,
            privilege_expire_at,
        })
    }

    fn sign_media(&self, grant: MediaGrant, uid: u32, role: AppRole, now: u32) -> Result<IssuedMedia, BuildError> {
        let token = self.media.build(&self.credentials, &grant, now, random_salt())?;
        debug!(
            channel = %grant.channel,
            uid,
            role = %role,
            scheme = %self.schemes.media,
            expire_at = grant.token_expire_at,
            "Issued media token"
        );
        Ok(IssuedMedia {
            token,
            expire_at: grant.token_expire_at,
            now,
            channel: grant.channel,
            uid,
            role,
        })
    }

    fn sign_signaling(&self, grant: SignalingGrant, now: u32) -> Result<IssuedSignaling, BuildError> {
        let token = self
            .signaling
            .build(&self.credentials, &grant, now, random_salt())?;
        debug!(
            account = %grant.account,
            scheme = %self.schemes.signaling,
            entry_point = self.signaling.entry_point(),
            expire_at = grant.privilege_expire_at,
            "Issued signaling token"
        );
        Ok(IssuedSignaling {
            token,
            expire_at: grant.privilege_expire_at,
            now,
            account: grant.account,
        })
    }
}
