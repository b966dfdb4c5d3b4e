//! `007` access tokens
//!
//! Text form: `"007"` + base64(zlib(pack(signature) ++ signing_info)).
//! `signing_info` packs the app id, issue time, relative expiry, salt and
//! the services in ascending type order. The HMAC key is derived from the
//! certificate, first keyed by issue time and then by salt.

use crate::config::{is_hex_id, Credentials};
use crate::error::{BuildError, VerifyError};
use crate::token::packing::{Packer, Unpacker};
use crate::token::service::Service;
use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::io::{Read, Write};

pub const VERSION: &str = "007";

/// Cap on inflated payload size
const MAX_INFLATED_BYTES: u64 = 64 * 1024;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct AccessToken2<'a> {
    credentials: &'a Credentials,
    issue_ts: u32,
    expire: u32,
    salt: u32,
    services: BTreeMap<u16, Service>,
}

impl<'a> AccessToken2<'a> {
    /// `expire` is seconds after `issue_ts`
    pub fn new(credentials: &'a Credentials, issue_ts: u32, expire: u32, salt: u32) -> Self {
        Self {
            credentials,
            issue_ts,
            expire,
            salt,
            services: BTreeMap::new(),
        }
    }

    /// Replaces any service of the same type
    pub fn add_service(&mut self, service: Service) {
        self.services.insert(service.kind(), service);
    }

    pub fn build(&self) -> Result<String, BuildError> {
        if !is_hex_id(self.credentials.app_certificate()) {
            return Err(BuildError::InvalidCredentials(
                "007 tokens need a 32 hex-character app certificate".to_string(),
            ));
        }
        if self.services.is_empty() {
            return Err(BuildError::Internal("token has no services".to_string()));
        }

        let signing_info = signing_info(
            self.credentials.app_id(),
            self.issue_ts,
            self.expire,
            self.salt,
            self.services.values(),
        )?;
        let mac = signing_mac(
            self.credentials.app_certificate(),
            self.issue_ts,
            self.salt,
            &signing_info,
        )
        .map_err(|e| BuildError::Internal(format!("hmac key: {}", e)))?;
        let signature = mac.finalize().into_bytes();

        let mut content = Packer::with_capacity(2 + signature.len() + signing_info.len());
        content.bytes(&signature)?;
        content.raw(&signing_info);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&content.finish())
            .map_err(|e| BuildError::Internal(format!("zlib: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| BuildError::Internal(format!("zlib: {}", e)))?;

        Ok(format!("{}{}", VERSION, STANDARD.encode(compressed)))
    }
}

fn signing_info<'s>(
    app_id: &str,
    issue_ts: u32,
    expire: u32,
    salt: u32,
    services: impl ExactSizeIterator<Item = &'s Service>,
) -> Result<Vec<u8>, BuildError> {
    let count = u16::try_from(services.len())
        .map_err(|_| BuildError::Internal("too many services".to_string()))?;

    let mut p = Packer::new();
    p.string(app_id)?;
    p.u32(issue_ts).u32(expire).u32(salt).u16(count);
    for service in services {
        service.pack_into(&mut p)?;
    }
    Ok(p.finish())
}

fn signing_mac(
    app_certificate: &str,
    issue_ts: u32,
    salt: u32,
    signing_info: &[u8],
) -> Result<HmacSha256, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(&issue_ts.to_le_bytes())?;
    mac.update(app_certificate.as_bytes());
    let key = mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&salt.to_le_bytes())?;
    mac.update(&key);
    let key = mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&key)?;
    mac.update(signing_info);
    Ok(mac)
}

/// Structural decode of a `007` token, no signature check
#[derive(Debug, Clone)]
pub struct DecodedToken2 {
    pub signature: Vec<u8>,
    pub app_id: String,
    pub issue_ts: u32,
    pub expire: u32,
    pub salt: u32,
    pub services: Vec<Service>,
    /// Signed bytes exactly as carried
    pub signing_info: Vec<u8>,
}

impl DecodedToken2 {
    pub fn parse(token: &str) -> Result<Self, VerifyError> {
        let body = token
            .strip_prefix(VERSION)
            .ok_or_else(|| VerifyError::MalformedToken("unsupported version".to_string()))?;

        let compressed = STANDARD
            .decode(body)
            .map_err(|e| VerifyError::MalformedToken(format!("base64: {}", e)))?;

        let mut content = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .take(MAX_INFLATED_BYTES)
            .read_to_end(&mut content)
            .map_err(|e| VerifyError::MalformedToken(format!("zlib: {}", e)))?;

        let mut u = Unpacker::new(&content);
        let signature = u.bytes()?.to_vec();
        let info_start = content.len() - u.remaining();

        let app_id = u.string()?;
        let issue_ts = u.u32()?;
        let expire = u.u32()?;
        let salt = u.u32()?;
        let count = u.u16()?;
        let mut services = Vec::new();
        for _ in 0..count {
            services.push(Service::unpack(&mut u)?);
        }
        if !u.is_exhausted() {
            return Err(VerifyError::MalformedToken("trailing bytes".to_string()));
        }

        Ok(Self {
            signature,
            app_id,
            issue_ts,
            expire,
            salt,
            services,
            signing_info: content[info_start..].to_vec(),
        })
    }

    /// Absolute outer expiry, `None` when unbounded
    pub fn expires_at(&self) -> Option<u32> {
        (self.expire != 0).then(|| self.issue_ts.saturating_add(self.expire))
    }
}

/// Verify a `007` token at time `now`
///
/// Channel and uid travel in the clear inside the RTC service, so unlike
/// `006` no issuance context is needed.
pub fn verify(token: &str, app_certificate: &str, now: u32) -> Result<DecodedToken2, VerifyError> {
    let decoded = DecodedToken2::parse(token)?;

    let mac = signing_mac(
        app_certificate,
        decoded.issue_ts,
        decoded.salt,
        &decoded.signing_info,
    )
    .map_err(|_| VerifyError::BadSignature)?;
    mac.verify_slice(&decoded.signature)
        .map_err(|_| VerifyError::BadSignature)?;

    if let Some(expired_at) = decoded.expires_at().filter(|exp| *exp < now) {
        return Err(VerifyError::Expired { expired_at, now });
    }
    for service in &decoded.services {
        for (privilege, rel) in service.privileges().iter() {
            let expired_at = decoded.issue_ts.saturating_add(rel);
            if rel != 0 && expired_at < now {
                return Err(VerifyError::PrivilegeExpired {
                    privilege,
                    expired_at,
                    now,
                });
            }
        }
    }

    Ok(decoded)
}
