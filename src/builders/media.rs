//! Media (RTC) channel tokens

use crate::builders::{now_secs, relative_expiry};
use crate::channels::{ChannelName, Identity};
use crate::config::{Credentials, TokenScheme};
use crate::error::BuildError;
use crate::roles::Role;
use crate::token::{random_salt, AccessToken, AccessToken2, Privilege, PrivilegeSet, Service};

/// What a media token authorizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGrant {
    pub channel: ChannelName,
    pub identity: Identity,
    pub role: Role,
    pub privilege_expire_at: u32,
    pub token_expire_at: u32,
}

impl MediaGrant {
    /// join until the token expires; publishers also get the stream
    /// privileges until `privilege_expire_at`
    pub fn privileges(&self) -> PrivilegeSet {
        let mut set = PrivilegeSet::new().with(Privilege::JoinChannel, self.token_expire_at);
        if self.role == Role::Publisher {
            for p in Privilege::PUBLISH {
                set.grant(p, self.privilege_expire_at);
            }
        }
        set
    }
}

/// Builds media tokens in one configured wire format
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaTokenBuilder {
    scheme: TokenScheme,
}

impl MediaTokenBuilder {
    pub fn new(scheme: TokenScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> TokenScheme {
        self.scheme
    }

    pub fn build(
        &self,
        credentials: &Credentials,
        grant: &MediaGrant,
        issue_ts: u32,
        salt: u32,
    ) -> Result<String, BuildError> {
        match self.scheme {
            TokenScheme::V006 => build_v006(credentials, grant, issue_ts, salt),
            TokenScheme::V007 => build_v007(credentials, grant, issue_ts, salt),
        }
    }
}

fn build_v006(
    credentials: &Credentials,
    grant: &MediaGrant,
    issue_ts: u32,
    salt: u32,
) -> Result<String, BuildError> {
    let uid = grant.identity.wire_uid();
    let mut token = AccessToken::new(credentials, grant.channel.as_str(), &uid, issue_ts, salt);
    for (privilege, expire_at) in grant.privileges().iter() {
        token.add_privilege(privilege, expire_at);
    }
    token.build()
}

fn build_v007(
    credentials: &Credentials,
    grant: &MediaGrant,
    issue_ts: u32,
    salt: u32,
) -> Result<String, BuildError> {
    let uid = grant.identity.wire_uid();
    let mut service = Service::rtc(grant.channel.as_str(), &uid);
    for (privilege, expire_at) in grant.privileges().iter() {
        service.add_privilege(privilege, relative_expiry(expire_at, issue_ts)?)?;
    }

    let expire = relative_expiry(grant.token_expire_at, issue_ts)?;
    let mut token = AccessToken2::new(credentials, issue_ts, expire, salt);
    token.add_service(service);
    token.build()
}

/// `006` media token issued now with a fresh salt
pub fn build_media_token(
    credentials: &Credentials,
    channel: &ChannelName,
    identity: &Identity,
    role: Role,
    privilege_expire_at: u32,
    token_expire_at: u32,
) -> Result<String, BuildError> {
    let grant = MediaGrant {
        channel: channel.clone(),
        identity: identity.clone(),
        role,
        privilege_expire_at,
        token_expire_at,
    };
    MediaTokenBuilder::new(TokenScheme::V006).build(credentials, &grant, now_secs(), random_salt())
}
