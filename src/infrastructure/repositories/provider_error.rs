/// Failure of an external voice or chat provider.
///
/// Never shown to visitors directly: the dispatcher turns these into failed
/// attempts and falls through to the next tier.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },
    #[error("{provider} request failed: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned {status}: {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },
    #[error("{provider} error: {message}")]
    Other {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured { provider }
            | ProviderError::Network { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::EmptyResponse { provider }
            | ProviderError::Other { provider, .. } => provider,
        }
    }
}
