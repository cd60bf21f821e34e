use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {message}")]
    Forbidden {
        message: String,
        /// Landing route of the denied user, so the client can bounce them home.
        redirect_to: Option<String>,
    },
    #[error("scope violation: {0}")]
    ScopeViolation(String),
    #[error("read-only violation: {0}")]
    ReadOnly(String),
    #[error("rate limit exceeded: {message}")]
    RateLimited { message: String, retry_after_ms: u64 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            redirect_to: None,
        }
    }

    pub fn forbidden_with_redirect(message: impl Into<String>, redirect_to: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            redirect_to: Some(redirect_to.into()),
        }
    }

    pub fn scope_violation(message: impl Into<String>) -> Self {
        Self::ScopeViolation(message.into())
    }

    pub fn read_only(message: impl Into<String>) -> Self {
        Self::ReadOnly(message.into())
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_ms: u64) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_ms,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } | AppError::ScopeViolation(_) | AppError::ReadOnly(_) => {
                StatusCode::FORBIDDEN
            }
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let error = match &self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden { .. } => "forbidden",
            AppError::ScopeViolation(_) => "scope_violation",
            AppError::ReadOnly(_) => "read_only",
            AppError::RateLimited { .. } => "rate_limit_exceeded",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        };

        let (redirect_to, retry_after_ms) = match &self {
            AppError::Forbidden { redirect_to, .. } => (redirect_to.clone(), None),
            AppError::RateLimited { retry_after_ms, .. } => (None, Some(*retry_after_ms)),
            _ => (None, None),
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
            redirect_to,
            retry_after_ms,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
