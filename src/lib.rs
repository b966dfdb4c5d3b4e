//! Roomkey - signed access tokens for media and signaling channels
//!
//! Builds and verifies time-bound, HMAC-signed tokens that authorize one
//! identity to join and publish on a media channel or log in to the
//! signaling service. An HTTP server issues tokens by application role and
//! serves a token-gated form for scheduling online sessions.

pub mod builders;
pub mod channels;
pub mod config;
pub mod error;
pub mod roles;
pub mod scheduling;
pub mod server;
pub mod service;
pub mod storage;
pub mod token;

pub use builders::{build_media_token, build_signaling_token};
pub use channels::{Account, ChannelName, Identity};
pub use config::{Credentials, TokenScheme, TokenSchemes};
pub use error::{BuildError, VerifyError};
pub use roles::{compute_expiry, resolve_role, AppRole, Role};
pub use service::TokenService;
pub use token::{Privilege, PrivilegeSet};
