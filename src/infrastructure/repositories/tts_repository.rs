use super::provider_error::ProviderError;
use async_trait::async_trait;

/// Encoded audio returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl SynthesizedAudio {
    pub fn mp3(data: Vec<u8>) -> Self {
        Self {
            data,
            content_type: "audio/mpeg".to_string(),
        }
    }
}

/// Repository for server-side speech synthesis.
/// Abstracts the underlying provider (ElevenLabs, OpenAI, AWS Polly).
///
/// Implementations are responsible for:
/// - Handling provider-specific text length limitations
/// - Merging audio chunks into a single audio stream
/// - Provider-specific voice selection
#[async_trait]
pub trait TtsRepository: Send + Sync {
    /// Short provider name used in logs and readiness output
    fn provider(&self) -> &'static str;

    /// Voice used for synthesis, part of the audio cache key
    fn voice(&self) -> &str;

    /// Synthesize prepared text (no markdown, normalized whitespace)
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, ProviderError>;
}
