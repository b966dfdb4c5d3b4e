//! Entry-point resolution for signaling token builders
//!
//! Signing libraries have exposed the signaling build operation under
//! several names over time. A [`SigningLibrary`] lists the names it
//! provides; [`SignalingBuilder::resolve`] picks one once, at startup, so a
//! library without any usable entry point fails before serving requests.

use crate::builders::signaling::{self, SignalingGrant};
use crate::config::{Credentials, TokenScheme};
use crate::error::BuildError;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// `(credentials, grant, issue_ts, salt) -> token`
pub type SignalingEntry = fn(&Credentials, &SignalingGrant, u32, u32) -> Result<String, BuildError>;

/// Names tried by [`SignalingBuilder::resolve`], in preference order
pub const SIGNALING_ENTRY_POINTS: [&str; 3] = ["build_token", "buildToken", "buildTokenWithUserAccount"];

/// A set of named signaling entry points
#[derive(Clone)]
pub struct SigningLibrary {
    name: String,
    entries: BTreeMap<String, SignalingEntry>,
}

impl SigningLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn expose(mut self, entry_point: &str, entry: SignalingEntry) -> Self {
        self.entries.insert(entry_point.to_string(), entry);
        self
    }

    /// The built-in library for a wire format
    pub fn for_scheme(scheme: TokenScheme) -> Self {
        match scheme {
            TokenScheme::V006 => Self::new("dynamic-key-006")
                .expose("build_token", signaling::build_v006)
                .expose("buildToken", signaling::build_v006),
            TokenScheme::V007 => Self::new("access-token-007").expose("build_token", signaling::build_v007),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self, entry_point: &str) -> Option<SignalingEntry> {
        self.entries.get(entry_point).copied()
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for SigningLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningLibrary")
            .field("name", &self.name)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A resolved signaling entry point
#[derive(Clone, Copy)]
pub struct SignalingBuilder {
    entry_point: &'static str,
    entry: SignalingEntry,
}

impl SignalingBuilder {
    pub fn resolve(library: &SigningLibrary) -> Result<Self, BuildError> {
        for entry_point in SIGNALING_ENTRY_POINTS {
            if let Some(entry) = library.entry(entry_point) {
                debug!(library = library.name(), entry_point, "Resolved signaling entry point");
                return Ok(Self { entry_point, entry });
            }
        }
        Err(BuildError::MissingCapability {
            library: library.name().to_string(),
            wanted: SIGNALING_ENTRY_POINTS.join(", "),
        })
    }

    pub fn entry_point(&self) -> &'static str {
        self.entry_point
    }

    pub fn build(
        &self,
        credentials: &Credentials,
        grant: &SignalingGrant,
        issue_ts: u32,
        salt: u32,
    ) -> Result<String, BuildError> {
        (self.entry)(credentials, grant, issue_ts, salt)
    }
}

impl fmt::Debug for SignalingBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalingBuilder")
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Account;

    fn stub(_: &Credentials, grant: &SignalingGrant, _: u32, _: u32) -> Result<String, BuildError> {
        Ok(format!("stub:{}", grant.account))
    }

    fn grant() -> SignalingGrant {
        SignalingGrant {
            account: Account::parse("alice").unwrap(),
            privilege_expire_at: 10,
        }
    }

    #[test]
    fn test_prefers_first_entry_point() {
        let lib = SigningLibrary::for_scheme(TokenScheme::V006);
        let builder = SignalingBuilder::resolve(&lib).unwrap();
        assert_eq!(builder.entry_point(), "build_token");
    }

    #[test]
    fn test_falls_back_to_later_names() {
        let lib = SigningLibrary::new("legacy").expose("buildTokenWithUserAccount", stub);
        let builder = SignalingBuilder::resolve(&lib).unwrap();
        assert_eq!(builder.entry_point(), "buildTokenWithUserAccount");

        let creds = Credentials::new("970CA35de60c44645bbae8a215061b33", "secret").unwrap();
        assert_eq!(builder.build(&creds, &grant(), 0, 0).unwrap(), "stub:alice");
    }

    #[test]
    fn test_camel_case_only() {
        let lib = SigningLibrary::new("camel").expose("buildToken", stub);
        assert_eq!(SignalingBuilder::resolve(&lib).unwrap().entry_point(), "buildToken");
    }

    #[test]
    fn test_missing_capability() {
        let lib = SigningLibrary::new("empty").expose("build", stub);
        let err = SignalingBuilder::resolve(&lib).unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingCapability {
                library: "empty".to_string(),
                wanted: "build_token, buildToken, buildTokenWithUserAccount".to_string(),
            }
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn test_builtin_libraries() {
        let v7 = SigningLibrary::for_scheme(TokenScheme::V007);
        assert_eq!(v7.entry_points().collect::<Vec<_>>(), vec!["build_token"]);
        assert!(v7.entry("buildToken").is_none());
    }
}
