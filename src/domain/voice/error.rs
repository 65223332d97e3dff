use super::dispatcher::TierAttempt;
use crate::domain::usage::LimitDenial;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum VoiceServiceError {
    #[error("{}", .0.reason)]
    LimitExceeded(LimitDenial),
    /// Every server tier failed or was skipped and the browser cannot speak
    #[error("Speech synthesis is not supported in this browser")]
    SpeechNotSupported { attempts: Vec<TierAttempt> },
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("audio {0} not found")]
    AudioNotFound(String),
}

impl From<VoiceServiceError> for AppError {
    fn from(err: VoiceServiceError) -> Self {
        match err {
            VoiceServiceError::LimitExceeded(denial) => AppError::RateLimited(denial),
            VoiceServiceError::SpeechNotSupported { .. } => {
                AppError::UnprocessableEntity(err.to_string())
            }
            VoiceServiceError::Invalid(msg) => AppError::BadRequest(msg),
            VoiceServiceError::AudioNotFound(_) => AppError::NotFound(err.to_string()),
        }
    }
}
