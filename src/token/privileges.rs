//! Privilege kinds and expiry sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A permitted action, identified on the wire by its `006` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    JoinChannel,
    PublishAudioStream,
    PublishVideoStream,
    PublishDataStream,
    PublishAudioCdn,
    PublishVideoCdn,
    RequestPublishAudioStream,
    RequestPublishVideoStream,
    RequestPublishDataStream,
    InvitePublishAudioStream,
    InvitePublishVideoStream,
    InvitePublishDataStream,
    AdministrateChannel,
    /// Signaling login
    Login,
}

impl Privilege {
    pub const ALL: [Privilege; 14] = [
        Privilege::JoinChannel,
        Privilege::PublishAudioStream,
        Privilege::PublishVideoStream,
        Privilege::PublishDataStream,
        Privilege::PublishAudioCdn,
        Privilege::PublishVideoCdn,
        Privilege::RequestPublishAudioStream,
        Privilege::RequestPublishVideoStream,
        Privilege::RequestPublishDataStream,
        Privilege::InvitePublishAudioStream,
        Privilege::InvitePublishVideoStream,
        Privilege::InvitePublishDataStream,
        Privilege::AdministrateChannel,
        Privilege::Login,
    ];

    /// The stream privileges a publisher receives
    pub const PUBLISH: [Privilege; 3] = [
        Privilege::PublishAudioStream,
        Privilege::PublishVideoStream,
        Privilege::PublishDataStream,
    ];

    pub fn code(self) -> u16 {
        match self {
            Privilege::JoinChannel => 1,
            Privilege::PublishAudioStream => 2,
            Privilege::PublishVideoStream => 3,
            Privilege::PublishDataStream => 4,
            Privilege::PublishAudioCdn => 5,
            Privilege::PublishVideoCdn => 6,
            Privilege::RequestPublishAudioStream => 7,
            Privilege::RequestPublishVideoStream => 8,
            Privilege::RequestPublishDataStream => 9,
            Privilege::InvitePublishAudioStream => 10,
            Privilege::InvitePublishVideoStream => 11,
            Privilege::InvitePublishDataStream => 12,
            Privilege::AdministrateChannel => 101,
            Privilege::Login => 1000,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Privilege::JoinChannel => "join_channel",
            Privilege::PublishAudioStream => "publish_audio_stream",
            Privilege::PublishVideoStream => "publish_video_stream",
            Privilege::PublishDataStream => "publish_data_stream",
            Privilege::PublishAudioCdn => "publish_audio_cdn",
            Privilege::PublishVideoCdn => "publish_video_cdn",
            Privilege::RequestPublishAudioStream => "request_publish_audio_stream",
            Privilege::RequestPublishVideoStream => "request_publish_video_stream",
            Privilege::RequestPublishDataStream => "request_publish_data_stream",
            Privilege::InvitePublishAudioStream => "invite_publish_audio_stream",
            Privilege::InvitePublishVideoStream => "invite_publish_video_stream",
            Privilege::InvitePublishDataStream => "invite_publish_data_stream",
            Privilege::AdministrateChannel => "administrate_channel",
            Privilege::Login => "login",
        };
        f.write_str(s)
    }
}

/// Privilege → expiry (epoch seconds, `0` = no expiry)
///
/// Backed by a `BTreeMap` keyed on the wire code so that serialization is
/// always in ascending code order. The signature covers those bytes
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeSet {
    entries: BTreeMap<u16, u32>,
}

impl PrivilegeSet {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert or replace a privilege
    pub fn grant(&mut self, privilege: Privilege, expire_at: u32) {
        self.entries.insert(privilege.code(), expire_at);
    }

    pub fn with(mut self, privilege: Privilege, expire_at: u32) -> Self {
        self.grant(privilege, expire_at);
        self
    }

    pub fn expire_at(&self, privilege: Privilege) -> Option<u32> {
        self.entries.get(&privilege.code()).copied()
    }

    pub fn contains(&self, privilege: Privilege) -> bool {
        self.entries.contains_key(&privilege.code())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in wire order
    pub fn iter(&self) -> impl Iterator<Item = (Privilege, u32)> + '_ {
        self.entries
            .iter()
            .filter_map(|(code, exp)| Privilege::from_code(*code).map(|p| (p, *exp)))
    }

    /// First privilege whose non-zero expiry is earlier than `now`
    pub fn first_expired(&self, now: u32) -> Option<(Privilege, u32)> {
        self.iter().find(|(_, exp)| *exp != 0 && *exp < now)
    }

    pub(crate) fn as_wire_map(&self) -> &BTreeMap<u16, u32> {
        &self.entries
    }

    /// Rebuild from a decoded wire map; `None` if any code is unknown
    pub(crate) fn from_wire_map(map: BTreeMap<u16, u32>) -> Option<Self> {
        if map.keys().all(|code| Privilege::from_code(*code).is_some()) {
            Some(Self { entries: map })
        } else {
            None
        }
    }
}

impl FromIterator<(Privilege, u32)> for PrivilegeSet {
    fn from_iter<T: IntoIterator<Item = (Privilege, u32)>>(iter: T) -> Self {
        let mut set = PrivilegeSet::new();
        for (p, exp) in iter {
            set.grant(p, exp);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for p in Privilege::ALL {
            assert_eq!(Privilege::from_code(p.code()), Some(p));
        }
        assert_eq!(Privilege::from_code(0), None);
        assert_eq!(Privilege::from_code(999), None);
    }

    #[test]
    fn test_iteration_is_ascending_by_code() {
        let set: PrivilegeSet = [
            (Privilege::Login, 10),
            (Privilege::PublishDataStream, 20),
            (Privilege::JoinChannel, 30),
        ]
        .into_iter()
        .collect();

        let order: Vec<_> = set.iter().map(|(p, _)| p).collect();
        assert_eq!(
            order,
            vec![
                Privilege::JoinChannel,
                Privilege::PublishDataStream,
                Privilege::Login
            ]
        );
    }

    #[test]
    fn test_grant_replaces() {
        let mut set = PrivilegeSet::new();
        set.grant(Privilege::JoinChannel, 100);
        set.grant(Privilege::JoinChannel, 200);
        assert_eq!(set.len(), 1);
        assert_eq!(set.expire_at(Privilege::JoinChannel), Some(200));
    }

    #[test]
    fn test_first_expired_skips_zero() {
        let set = PrivilegeSet::new()
            .with(Privilege::JoinChannel, 0)
            .with(Privilege::PublishAudioStream, 99);

        assert_eq!(set.first_expired(50), None);
        assert_eq!(
            set.first_expired(100),
            Some((Privilege::PublishAudioStream, 99))
        );
    }

    #[test]
    fn test_unknown_wire_code_rejected() {
        let mut map = BTreeMap::new();
        map.insert(1, 5);
        map.insert(77, 5);
        assert!(PrivilegeSet::from_wire_map(map).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Privilege::JoinChannel.to_string(), "join_channel");
        assert_eq!(Privilege::Login.to_string(), "login");
    }
}
