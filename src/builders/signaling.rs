//! Signaling (RTM) login tokens

use crate::builders::capability::SignalingBuilder;
use crate::builders::{now_secs, relative_expiry};
use crate::channels::Account;
use crate::config::Credentials;
use crate::error::BuildError;
use crate::token::{random_salt, AccessToken, AccessToken2, Privilege, Service};

/// What a signaling token authorizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingGrant {
    pub account: Account,
    pub privilege_expire_at: u32,
}

/// `006` form: the account takes the channel slot and the uid is empty
pub(crate) fn build_v006(
    credentials: &Credentials,
    grant: &SignalingGrant,
    issue_ts: u32,
    salt: u32,
) -> Result<String, BuildError> {
    let mut token = AccessToken::new(credentials, grant.account.as_str(), "", issue_ts, salt);
    token.add_privilege(Privilege::Login, grant.privilege_expire_at);
    token.build()
}

pub(crate) fn build_v007(
    credentials: &Credentials,
    grant: &SignalingGrant,
    issue_ts: u32,
    salt: u32,
) -> Result<String, BuildError> {
    let expire = relative_expiry(grant.privilege_expire_at, issue_ts)?;
    let mut service = Service::rtm(grant.account.as_str());
    service.add_privilege(Privilege::Login, expire)?;

    let mut token = AccessToken2::new(credentials, issue_ts, expire, salt);
    token.add_service(service);
    token.build()
}

/// Signaling token issued now with a fresh salt, through an entry point
/// resolved at startup
pub fn build_signaling_token(
    builder: &SignalingBuilder,
    credentials: &Credentials,
    account: &Account,
    privilege_expire_at: u32,
) -> Result<String, BuildError> {
    let grant = SignalingGrant {
        account: account.clone(),
        privilege_expire_at,
    };
    builder.build(credentials, &grant, now_secs(), random_salt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::capability::SigningLibrary;
    use crate::config::TokenScheme;
    use crate::token::{access_token, access_token2, ServiceScope};

    const APP_ID: &str = "970CA35de60c44645bbae8a215061b33";
    const APP_CERT: &str = "5CFd2fd1755d40ecb72977518be15d3b";
    const NOW: u32 = 1_700_000_000;

    fn grant() -> SignalingGrant {
        SignalingGrant {
            account: Account::parse("alice").unwrap(),
            privilege_expire_at: NOW + 3600,
        }
    }

    #[test]
    fn test_v006_login_privilege() {
        let creds = Credentials::new(APP_ID, "secret").unwrap();
        let token = build_v006(&creds, &grant(), NOW, 3).unwrap();

        let verified = access_token::verify(&token, "secret", "alice", "", NOW).unwrap();
        let privileges = verified.message.privileges();
        assert_eq!(privileges.len(), 1);
        assert_eq!(privileges.expire_at(Privilege::Login), Some(NOW + 3600));
    }

    #[test]
    fn test_v007_login_privilege() {
        let creds = Credentials::new(APP_ID, APP_CERT).unwrap();
        let token = build_v007(&creds, &grant(), NOW, 3).unwrap();

        let decoded = access_token2::verify(&token, APP_CERT, NOW).unwrap();
        assert_eq!(
            decoded.services[0].scope(),
            &ServiceScope::Rtm {
                user_id: "alice".to_string()
            }
        );
        assert_eq!(
            decoded.services[0].privileges().expire_at(Privilege::Login),
            Some(3600)
        );
    }

    #[test]
    fn test_build_signaling_token() {
        let creds = Credentials::new(APP_ID, "secret").unwrap();
        let now = now_secs();
        let account = Account::parse("alice").unwrap();
        let builder = SignalingBuilder::resolve(&SigningLibrary::for_scheme(TokenScheme::V006)).unwrap();
        let token = build_signaling_token(&builder, &creds, &account, now + 60).unwrap();
        assert!(token.starts_with("006"));
        assert!(access_token::verify(&token, "secret", "alice", "", now).is_ok());
    }

    fn stub(_: &Credentials, grant: &SignalingGrant, _: u32, _: u32) -> Result<String, BuildError> {
        Ok(format!("stub:{}", grant.account))
    }

    #[test]
    fn test_build_signaling_token_uses_given_builder() {
        let lib = SigningLibrary::new("legacy").expose("buildTokenWithUserAccount", stub);
        let builder = SignalingBuilder::resolve(&lib).unwrap();
        let creds = Credentials::new(APP_ID, "secret").unwrap();
        let account = Account::parse("alice").unwrap();
        assert_eq!(
            build_signaling_token(&builder, &creds, &account, 0).unwrap(),
            "stub:alice"
        );
    }
}
