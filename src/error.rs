//! Error types for token issuing and verification

use crate::token::packing::PackError;
use crate::token::Privilege;
use thiserror::Error;

/// Errors raised while building a token
///
/// Validation variants are raised before any cryptographic work and mean the
/// caller must correct its input. The rest indicate a defect or a bad
/// deployment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid duration: {0} seconds (allowed {min}..={max})", min = crate::roles::MIN_DURATION_SECS, max = crate::roles::MAX_DURATION_SECS)]
    InvalidDuration(i64),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("signing library '{library}' exposes none of: {wanted}")]
    MissingCapability { library: String, wanted: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl BuildError {
    /// True for errors caused by caller input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BuildError::InvalidChannel(_)
                | BuildError::InvalidIdentity(_)
                | BuildError::InvalidDuration(_)
                | BuildError::InvalidExpiry(_)
        )
    }
}

impl From<PackError> for BuildError {
    fn from(e: PackError) -> Self {
        BuildError::Encoding(e.to_string())
    }
}

/// Outcome of a failed verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired at {expired_at} (now {now})")]
    Expired { expired_at: u32, now: u32 },

    #[error("privilege {privilege} expired at {expired_at} (now {now})")]
    PrivilegeExpired {
        privilege: Privilege,
        expired_at: u32,
        now: u32,
    },

    #[error("malformed token: {0}")]
    MalformedToken(String),
}

impl VerifyError {
    pub fn is_expired(&self) -> bool {
        matches!(
            self,
            VerifyError::Expired { .. } | VerifyError::PrivilegeExpired { .. }
        )
    }
}

impl From<PackError> for VerifyError {
    fn from(e: PackError) -> Self {
        VerifyError::MalformedToken(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_split() {
        assert!(BuildError::InvalidChannel("x".into()).is_validation());
        assert!(BuildError::InvalidIdentity("x".into()).is_validation());
        assert!(BuildError::InvalidDuration(5).is_validation());
        assert!(!BuildError::Encoding("x".into()).is_validation());
        assert!(!BuildError::Internal("x".into()).is_validation());
        assert!(!BuildError::InvalidCredentials("x".into()).is_validation());
    }

    #[test]
    fn test_duration_display() {
        let err = BuildError::InvalidDuration(59);
        assert_eq!(
            err.to_string(),
            "invalid duration: 59 seconds (allowed 60..=86400)"
        );
    }

    #[test]
    fn test_pack_error_maps_to_malformed() {
        let err: VerifyError = PackError::InvalidUtf8.into();
        assert!(matches!(err, VerifyError::MalformedToken(_)));
    }

    #[test]
    fn test_expired_variants() {
        assert!(VerifyError::Expired {
            expired_at: 1,
            now: 2
        }
        .is_expired());
        assert!(VerifyError::PrivilegeExpired {
            privilege: Privilege::JoinChannel,
            expired_at: 1,
            now: 2
        }
        .is_expired());
        assert!(!VerifyError::BadSignature.is_expired());
    }
}
