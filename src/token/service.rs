//! Service messages carried by `007` tokens
//!
//! Each service packs a type discriminator, its privilege map (codes are
//! scoped to the service), then schema-specific trailing fields.

use crate::error::{BuildError, VerifyError};
use crate::token::packing::{Packer, Unpacker};
use crate::token::privileges::{Privilege, PrivilegeSet};
use std::collections::BTreeMap;

/// Upper bound on any serialized string field
pub const MAX_FIELD_BYTES: usize = 512;

pub const SERVICE_RTC: u16 = 1;
pub const SERVICE_RTM: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceScope {
    Rtc { channel: String, uid: String },
    Rtm { user_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    scope: ServiceScope,
    /// service-scoped code -> seconds relative to issue time
    privileges: BTreeMap<u16, u32>,
}

impl Service {
    pub fn rtc(channel: &str, uid: &str) -> Self {
        Self {
            scope: ServiceScope::Rtc {
                channel: channel.to_string(),
                uid: uid.to_string(),
            },
            privileges: BTreeMap::new(),
        }
    }

    pub fn rtm(user_id: &str) -> Self {
        Self {
            scope: ServiceScope::Rtm {
                user_id: user_id.to_string(),
            },
            privileges: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> u16 {
        match self.scope {
            ServiceScope::Rtc { .. } => SERVICE_RTC,
            ServiceScope::Rtm { .. } => SERVICE_RTM,
        }
    }

    pub fn scope(&self) -> &ServiceScope {
        &self.scope
    }

    /// `expire` is in seconds after issue time
    pub fn add_privilege(&mut self, privilege: Privilege, expire: u32) -> Result<(), BuildError> {
        let code = scoped_code(self.kind(), privilege).ok_or_else(|| {
            BuildError::Internal(format!(
                "privilege {} not valid for service {}",
                privilege,
                self.kind()
            ))
        })?;
        self.privileges.insert(code, expire);
        Ok(())
    }

    /// Privileges with relative expiries
    pub fn privileges(&self) -> PrivilegeSet {
        self.privileges
            .iter()
            .filter_map(|(code, exp)| unscoped(self.kind(), *code).map(|p| (p, *exp)))
            .collect()
    }

    pub fn pack(&self) -> Result<Vec<u8>, BuildError> {
        let mut p = Packer::new();
        self.pack_into(&mut p)?;
        Ok(p.finish())
    }

    pub(crate) fn pack_into(&self, p: &mut Packer) -> Result<(), BuildError> {
        p.u16(self.kind());
        p.map_u32(&self.privileges)?;
        match &self.scope {
            ServiceScope::Rtc { channel, uid } => {
                p.string(bounded("channel", channel)?)?;
                p.string(bounded("uid", uid)?)?;
            }
            ServiceScope::Rtm { user_id } => {
                p.string(bounded("user_id", user_id)?)?;
            }
        }
        Ok(())
    }

    pub(crate) fn unpack(u: &mut Unpacker<'_>) -> Result<Self, VerifyError> {
        let kind = u.u16()?;
        let privileges = u.map_u32()?;
        if privileges.keys().any(|code| unscoped(kind, *code).is_none()) {
            return Err(VerifyError::MalformedToken(format!(
                "unknown privilege for service {}",
                kind
            )));
        }
        let scope = match kind {
            SERVICE_RTC => ServiceScope::Rtc {
                channel: u.string()?,
                uid: u.string()?,
            },
            SERVICE_RTM => ServiceScope::Rtm {
                user_id: u.string()?,
            },
            other => {
                return Err(VerifyError::MalformedToken(format!(
                    "unknown service type {}",
                    other
                )))
            }
        };
        Ok(Self { scope, privileges })
    }
}

/// Rejects strings over [`MAX_FIELD_BYTES`]
pub(crate) fn bounded<'a>(field: &str, value: &'a str) -> Result<&'a str, BuildError> {
    if value.len() > MAX_FIELD_BYTES {
        return Err(BuildError::Encoding(format!(
            "{} is {} bytes, limit {}",
            field,
            value.len(),
            MAX_FIELD_BYTES
        )));
    }
    Ok(value)
}

fn scoped_code(kind: u16, privilege: Privilege) -> Option<u16> {
    match (kind, privilege) {
        (SERVICE_RTC, Privilege::JoinChannel) => Some(1),
        (SERVICE_RTC, Privilege::PublishAudioStream) => Some(2),
        (SERVICE_RTC, Privilege::PublishVideoStream) => Some(3),
        (SERVICE_RTC, Privilege::PublishDataStream) => Some(4),
        (SERVICE_RTM, Privilege::Login) => Some(1),
        _ => None,
    }
}

fn unscoped(kind: u16, code: u16) -> Option<Privilege> {
    match (kind, code) {
        (SERVICE_RTC, 1) => Some(Privilege::JoinChannel),
        (SERVICE_RTC, 2) => Some(Privilege::PublishAudioStream),
        (SERVICE_RTC, 3) => Some(Privilege::PublishVideoStream),
        (SERVICE_RTC, 4) => Some(Privilege::PublishDataStream),
        (SERVICE_RTM, 1) => Some(Privilege::Login),
        _ => None,
    }
}
