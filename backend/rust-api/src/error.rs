use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Per-request error taxonomy. None of these is fatal to the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input; the caller must correct and retry.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Lock already held or duplicate resource; expected and user-retriable.
    #[error("{message}")]
    Conflict {
        message: String,
        retry_after_seconds: Option<i64>,
    },

    /// Over the rolling request quota; retry once the window elapses.
    #[error("too many requests, retry after the current window elapses")]
    RateLimited,

    /// Content-provisioning gap (e.g. empty task pool); operator-actionable,
    /// not something the caller can fix.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn conflict(message: impl Into<String>, retry_after_seconds: Option<i64>) -> Self {
        ApiError::Conflict {
            message: message.into(),
            retry_after_seconds,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict { .. } => "conflict",
            ApiError::RateLimited => "rate_limited",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Conflict and RateLimited are routine outcomes, not errors of concern.
        match &self {
            ApiError::Conflict { .. } | ApiError::RateLimited => {
                tracing::info!("request rejected: {}", self)
            }
            ApiError::Validation(_) | ApiError::NotFound(_) => {
                tracing::debug!("client error: {}", self)
            }
            ApiError::Unavailable(_) => tracing::warn!("unavailable: {}", self),
            ApiError::Internal(e) => tracing::error!("internal error: {:#}", e),
        }

        let status = self.status();
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let ApiError::Conflict {
            retry_after_seconds: Some(secs),
            ..
        } = &self
        {
            body["retry_after_seconds"] = json!(secs);
        }

        (status, Json(body)).into_response()
    }
}
