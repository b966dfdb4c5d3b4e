//! Roomkey HTTP server
//!
//! Issues media and signaling tokens and serves the scheduling form.

mod api_key;
mod error;
pub mod http;

pub use api_key::{ApiKey, API_KEY_ENV};
pub use error::ApiError;
pub use http::{
    create_router, run_server, AppState, CombinedTokenResponse, SignalingTokenResponse, TokenRequest,
    TokenResponse,
};
