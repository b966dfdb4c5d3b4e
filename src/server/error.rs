//! HTTP error responses

use crate::error::BuildError;
use crate::scheduling::ScheduleError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by handlers, rendered as `{"detail": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API key")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Gone(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BuildError> for ApiError {
    fn from(e: BuildError) -> Self {
        if e.is_validation() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(format!("failed to generate token: {}", e))
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::InvalidToken | ScheduleError::Validation(_) => ApiError::BadRequest(e.to_string()),
            ScheduleError::TokenNotFound => ApiError::NotFound(e.to_string()),
            ScheduleError::TokenUsed | ScheduleError::TokenExpired => ApiError::Gone(e.to_string()),
            ScheduleError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_build_error_mapping() {
        let e: ApiError = BuildError::InvalidChannel("empty".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: ApiError = BuildError::InvalidDuration(10).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: ApiError = BuildError::Encoding("too long".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_schedule_error_mapping() {
        let cases = [
            (ScheduleError::InvalidToken, StatusCode::BAD_REQUEST),
            (ScheduleError::TokenNotFound, StatusCode::NOT_FOUND),
            (ScheduleError::TokenUsed, StatusCode::GONE),
            (ScheduleError::TokenExpired, StatusCode::GONE),
            (ScheduleError::Validation("host is required".into()), StatusCode::BAD_REQUEST),
            (
                ScheduleError::Storage(StorageError::Database("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
