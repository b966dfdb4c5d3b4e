//! Privilege message carried by `006` tokens

use crate::token::packing::{PackError, Packer, Unpacker};
use crate::token::privileges::PrivilegeSet;

/// What is authorized until when
///
/// `ts` is the envelope's outer expiry stamp. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    salt: u32,
    ts: u32,
    privileges: PrivilegeSet,
}

impl Message {
    pub fn new(salt: u32, ts: u32, privileges: PrivilegeSet) -> Self {
        Self {
            salt,
            ts,
            privileges,
        }
    }

    pub fn salt(&self) -> u32 {
        self.salt
    }

    pub fn ts(&self) -> u32 {
        self.ts
    }

    pub fn privileges(&self) -> &PrivilegeSet {
        &self.privileges
    }

    /// salt, ts, privilege map
    pub fn pack(&self) -> Result<Vec<u8>, PackError> {
        let mut p = Packer::with_capacity(10 + self.privileges.len() * 6);
        p.u32(self.salt).u32(self.ts);
        p.map_u32(self.privileges.as_wire_map())?;
        Ok(p.finish())
    }

    /// Inverse of [`Message::pack`]; `None` for unknown privilege codes
    pub fn unpack(buf: &[u8]) -> Result<Option<Self>, PackError> {
        let mut u = Unpacker::new(buf);
        let salt = u.u32()?;
        let ts = u.u32()?;
        let map = u.map_u32()?;
        Ok(PrivilegeSet::from_wire_map(map).map(|privileges| Self {
            salt,
            ts,
            privileges,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Privilege;

    #[test]
    fn test_pack_layout() {
        let msg = Message::new(
            1,
            2,
            PrivilegeSet::new().with(Privilege::JoinChannel, 3),
        );
        let bytes = msg.pack().unwrap();
        assert_eq!(
            bytes,
            vec![1, 0, 0, 0, 2, 0, 0, 0, 1, 0, 1, 0, 3, 0, 0, 0]
        );
    }

    #[test]
    fn test_round_trip() {
        let privileges = PrivilegeSet::new()
            .with(Privilege::JoinChannel, 1_700_003_600)
            .with(Privilege::PublishAudioStream, 1_700_003_600)
            .with(Privilege::Login, 0);
        let msg = Message::new(42, 1_700_086_400, privileges);

        let bytes = msg.pack().unwrap();
        assert_eq!(Message::unpack(&bytes).unwrap(), Some(msg));
    }

    #[test]
    fn test_unpack_truncated() {
        assert!(matches!(
            Message::unpack(&[1, 0, 0]),
            Err(PackError::Truncated { .. })
        ));
    }
}
