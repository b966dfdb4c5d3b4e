//! Token signing core
//!
//! Two wire formats are supported:
//! - `006`: HMAC over app id, channel, uid and the packed privilege message,
//!   with CRC32 checks of channel and uid in the envelope
//! - `007`: per-service privilege messages, derived signing key, zlib
//!   compressed envelope
//!
//! Both use the little-endian packing in [`packing`].

pub mod access_token;
pub mod access_token2;
pub mod message;
pub mod packing;
mod privileges;
pub mod service;

#[cfg(test)]
mod proptest_codec;

pub use access_token::{AccessToken, DecodedToken, VerifiedToken};
pub use access_token2::{AccessToken2, DecodedToken2};
pub use message::Message;
pub use packing::{PackError, Packer, Unpacker};
pub use privileges::{Privilege, PrivilegeSet};
pub use service::{Service, ServiceScope};

use rand::Rng;

/// Salts are drawn from `1..=99_999_999`
pub const SALT_RANGE: std::ops::RangeInclusive<u32> = 1..=99_999_999;

/// Fresh random salt for one token
pub fn random_salt() -> u32 {
    rand::rng().random_range(SALT_RANGE)
}

/// Version prefix of a token string, if it is one we understand
pub fn token_version(token: &str) -> Option<&'static str> {
    if token.starts_with(access_token::VERSION) {
        Some(access_token::VERSION)
    } else if token.starts_with(access_token2::VERSION) {
        Some(access_token2::VERSION)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_salt_in_range() {
        for _ in 0..1000 {
            assert!(SALT_RANGE.contains(&random_salt()));
        }
    }

    #[test]
    fn test_token_version() {
        assert_eq!(token_version("006abc"), Some("006"));
        assert_eq!(token_version("007eJ"), Some("007"));
        assert_eq!(token_version("008"), None);
    }
}
