//! Service-specific token builders
//!
//! - `media`: join/publish tokens for a media channel
//! - `signaling`: login tokens for the signaling service
//! - `capability`: startup-time choice of the signaling entry point

pub mod capability;
pub mod media;
pub mod signaling;

pub use capability::{SignalingBuilder, SigningLibrary, SIGNALING_ENTRY_POINTS};
pub use media::{build_media_token, MediaGrant, MediaTokenBuilder};
pub use signaling::{build_signaling_token, SignalingGrant};

use crate::error::BuildError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in epoch seconds
pub fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}

/// Absolute expiry to seconds after `issue_ts`, as `007` encodes it.
/// `0` stays `0` (no expiry).
pub(crate) fn relative_expiry(expire_at: u32, issue_ts: u32) -> Result<u32, BuildError> {
    if expire_at == 0 {
        return Ok(0);
    }
    if expire_at <= issue_ts {
        return Err(BuildError::InvalidExpiry(format!(
            "expiry {} is not after issue time {}",
            expire_at, issue_ts
        )));
    }
    Ok(expire_at - issue_ts)
}
