//! HTTP API: token endpoints and the scheduling form

use crate::builders::now_secs;
use crate::roles::{AppRole, DEFAULT_DURATION_SECS};
use crate::scheduling::{CoverUpload, FormPrefill, ScheduleRequest, ScheduledSession, Scheduler};
use crate::server::api_key::ApiKey;
use crate::server::error::ApiError;
use crate::service::TokenService;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Upper bound for a scheduling form submission, cover included
pub const MAX_FORM_BYTES: usize = 16 * 1024 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub scheduler: Scheduler,
    pub api_key: Option<ApiKey>,
}

impl AppState {
    fn authorize(&self, candidate: Option<&str>) -> Result<(), ApiError> {
        match &self.api_key {
            Some(key) if !key.check(candidate) => {
                warn!("Rejected request with invalid API key");
                Err(ApiError::Unauthorized)
            }
            _ => Ok(()),
        }
    }
}

fn default_expire_seconds() -> i64 {
    DEFAULT_DURATION_SECS
}

/// Body shared by all token endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub channel: String,
    pub uid: i64,
    pub role: AppRole,
    #[serde(default = "default_expire_seconds")]
    pub expire_seconds: i64,
    #[serde(default)]
    pub user_account: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expire_at: u32,
    pub now: u32,
    pub channel: String,
    pub uid: u32,
    pub role: AppRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingTokenResponse {
    pub token: String,
    pub expire_at: u32,
    pub now: u32,
    pub uid: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedTokenResponse {
    pub rtc_token: String,
    pub rtm_token: String,
    pub expire_at: u32,
    pub now: u32,
    pub channel: String,
    pub uid: u32,
    pub role: AppRole,
    pub user_account: String,
}

#[derive(Debug, Deserialize)]
pub struct FormQuery {
    pub token: String,
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rtc/token", post(rtc_token_handler))
        .route("/rtm/token", post(rtm_token_handler))
        .route("/token", post(combined_token_handler))
        .route(
            "/online/schedule",
            get(schedule_form_handler)
                .post(schedule_submit_handler)
                .layer(DefaultBodyLimit::max(MAX_FORM_BYTES)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "time": now_secs() }))
}

async fn rtc_token_handler(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload?;
    state.authorize(req.api_key.as_deref())?;

    let issued = state
        .tokens
        .issue_media(&req.channel, req.uid, req.role, req.expire_seconds, now_secs())?;

    Ok(Json(TokenResponse {
        token: issued.token,
        expire_at: issued.expire_at,
        now: issued.now,
        channel: issued.channel.to_string(),
        uid: issued.uid,
        role: issued.role,
    }))
}

async fn rtm_token_handler(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<SignalingTokenResponse>, ApiError> {
    let Json(req) = payload?;
    state.authorize(req.api_key.as_deref())?;

    let issued = state.tokens.issue_signaling(
        req.user_account.as_deref(),
        req.uid,
        req.expire_seconds,
        now_secs(),
    )?;

    Ok(Json(SignalingTokenResponse {
        token: issued.token,
        expire_at: issued.expire_at,
        now: issued.now,
        uid: req.uid,
    }))
}

async fn combined_token_handler(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<CombinedTokenResponse>, ApiError> {
    let Json(req) = payload?;
    state.authorize(req.api_key.as_deref())?;

    let issued = state.tokens.issue_combined(
        &req.channel,
        req.uid,
        req.role,
        req.expire_seconds,
        req.user_account.as_deref(),
        now_secs(),
    )?;

    Ok(Json(CombinedTokenResponse {
        rtc_token: issued.media.token,
        rtm_token: issued.signaling.token,
        expire_at: issued.media.expire_at,
        now: issued.media.now,
        channel: issued.media.channel.to_string(),
        uid: issued.media.uid,
        role: issued.media.role,
        user_account: issued.signaling.account.to_string(),
    }))
}

async fn schedule_form_handler(
    State(state): State<AppState>,
    Query(query): Query<FormQuery>,
) -> Result<Json<FormPrefill>, ApiError> {
    let prefill = state.scheduler.prefill(&query.token, Utc::now()).await?;
    Ok(Json(prefill))
}

async fn schedule_submit_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ScheduledSession>, ApiError> {
    let request = read_schedule_form(multipart).await?;
    let scheduled = state.scheduler.schedule(request, Utc::now()).await?;
    Ok(Json(scheduled))
}

async fn read_schedule_form(mut multipart: Multipart) -> Result<ScheduleRequest, ApiError> {
    let mut token = None;
    let mut date = None;
    let mut time = None;
    let mut subject = None;
    let mut host = None;
    let mut cohost = None;
    let mut cover = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "cover" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            cover = Some(CoverUpload {
                filename,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "token" => token = Some(value),
            "date" => date = Some(value),
            "time" => time = Some(value),
            "subject" => subject = Some(value),
            "host" => host = Some(value),
            "cohost" => cohost = Some(value),
            _ => {}
        }
    }

    let missing = |field: &str| ApiError::BadRequest(format!("missing form field: {}", field));
    Ok(ScheduleRequest {
        token: token.ok_or_else(|| missing("token"))?,
        date: date.ok_or_else(|| missing("date"))?,
        time: time.ok_or_else(|| missing("time"))?,
        subject: subject.ok_or_else(|| missing("subject"))?,
        host: host.ok_or_else(|| missing("host"))?,
        cohost: cohost.filter(|c| !c.trim().is_empty()),
        cover: cover.ok_or_else(|| missing("cover"))?,
    })
}

/// Serve until `shutdown` resolves
pub async fn run_server<F>(bind_addr: SocketAddr, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "HTTP server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
