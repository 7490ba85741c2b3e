use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced as a plain HTTP response, before any stream is opened.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ApiError::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Failure of a provider standing in for an external inference engine.
#[derive(Error, Debug)]
#[error("{provider}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
}

/// Reasons a streamed run stops before its completion frame.
#[derive(Error, Debug)]
pub enum RunError {
    /// The client went away; nothing is reported.
    #[error("transport closed")]
    TransportClosed,

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("run budget exceeded: ${spent:.4} + ${next:.4} > ${limit:.4}")]
    BudgetExceeded { spent: f64, next: f64, limit: f64 },

    #[error("run exceeded time limit of {0:?}")]
    Timeout(Duration),
}

impl RunError {
    /// Short machine-readable code placed in the `error` field of an error frame.
    pub fn code(&self) -> &'static str {
        match self {
            RunError::TransportClosed => "transport_closed",
            RunError::Upstream(_) => "upstream_failure",
            RunError::BudgetExceeded { .. } => "budget_exceeded",
            RunError::Timeout(_) => "timeout",
        }
    }
}

impl From<ProviderError> for RunError {
    fn from(err: ProviderError) -> Self {
        RunError::Upstream(err.to_string())
    }
}
