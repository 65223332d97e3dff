use crate::domain::usage::LimitDenial;
use crate::error::AppError;

/// Shown to visitors whenever the chat provider fails; there is no fallback tier
pub const TRY_AGAIN_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ChatServiceError {
    #[error("{}", .0.reason)]
    LimitExceeded(LimitDenial),
    #[error("conversation {0} not found")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("chat is not configured")]
    NotConfigured,
    #[error("{}", TRY_AGAIN_MESSAGE)]
    Provider,
}

impl From<ChatServiceError> for AppError {
    fn from(err: ChatServiceError) -> Self {
        match err {
            ChatServiceError::LimitExceeded(denial) => AppError::RateLimited(denial),
            ChatServiceError::NotFound(_) => AppError::NotFound(err.to_string()),
            ChatServiceError::Invalid(msg) => AppError::BadRequest(msg),
            ChatServiceError::NotConfigured => AppError::ServiceUnavailable(err.to_string()),
            ChatServiceError::Provider => AppError::ExternalService(err.to_string()),
        }
    }
}
