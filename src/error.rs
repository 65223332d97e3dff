use crate::domain::usage::{LimitDenial, LimitViolation, UsageSnapshot};
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A usage policy refused the request
    #[error("{}", .0.reason)]
    RateLimited(LimitDenial),

    #[error("{0}")]
    UnprocessableEntity(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<LimitViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_usage: Option<UsageSnapshot>,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(denial) if denial.violation == LimitViolation::MessageTooLong => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        match self {
            Self::RateLimited(denial) => ErrorResponse {
                message: denial.reason.clone(),
                code: Some(denial.violation),
                retry_after_ms: denial.retry_after_ms,
                current_usage: Some(denial.current_usage.clone()),
            },
            other => ErrorResponse {
                message: other.to_string(),
                code: None,
                retry_after_ms: None,
                current_usage: None,
            },
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited(denial) => denial.retry_after_ms.map(|ms| ms.div_ceil(1000).max(1)),
            _ => None,
        }
    }
}

impl From<LimitDenial> for AppError {
    fn from(denial: LimitDenial) -> Self {
        AppError::RateLimited(denial)
    }
}

/// Implement IntoResponse for automatic conversion in handlers
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Policy refusals are expected traffic, not failures
        match &self {
            Self::RateLimited(denial) => tracing::info!(
                violation = ?denial.violation,
                retry_after_ms = ?denial.retry_after_ms,
                status = %status.as_u16(),
                "Request refused by usage policy"
            ),
            _ if status.is_server_error() => tracing::error!(
                error = %self,
                status = %status.as_u16(),
                "Request failed"
            ),
            _ => tracing::warn!(
                error = %self,
                status = %status.as_u16(),
                "Request rejected"
            ),
        }

        let retry_after = self.retry_after_secs();
        let mut response = (status, Json(self.to_response())).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;
