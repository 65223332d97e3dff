use super::provider_error::ProviderError;
use super::tts_repository::{SynthesizedAudio, TtsRepository};
use crate::domain::voice::text::split_into_batches;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;

/// OpenAI has a limit of 4096 characters per request
const MAX_BATCH_SIZE: usize = 4096;

const PROVIDER: &str = "openai";

/// OpenAI speech implementation of the standard voice tier
pub struct OpenAiTtsRepository {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    voice: String,
}

impl OpenAiTtsRepository {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String, voice: String) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }

    fn speech_model(&self) -> SpeechModel {
        match self.model.as_str() {
            "tts-1" => SpeechModel::Tts1,
            "tts-1-hd" => SpeechModel::Tts1Hd,
            other => SpeechModel::Other(other.to_string()),
        }
    }

    fn speech_voice(&self) -> Voice {
        match self.voice.to_lowercase().as_str() {
            "echo" => Voice::Echo,
            "fable" => Voice::Fable,
            "onyx" => Voice::Onyx,
            "nova" => Voice::Nova,
            "shimmer" => Voice::Shimmer,
            _ => Voice::Alloy,
        }
    }

    /// Call OpenAI speech API for a single text batch
    async fn call_openai(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        tracing::debug!(
            model = %self.model,
            voice = %self.voice,
            text_length = text.len(),
            "Calling OpenAI speech API"
        );

        let request = CreateSpeechRequest {
            model: self.speech_model(),
            input: text.to_string(),
            voice: self.speech_voice(),
            response_format: None, // Defaults to MP3
            speed: None,
        };

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    model = %self.model,
                    text_length = text.len(),
                    "OpenAI speech API call failed"
                );
                match e {
                    OpenAIError::Reqwest(err) => ProviderError::Network {
                        provider: PROVIDER,
                        message: err.to_string(),
                    },
                    other => ProviderError::Other {
                        provider: PROVIDER,
                        message: other.to_string(),
                    },
                }
            })?;

        Ok(response.bytes.to_vec())
    }
}

#[async_trait]
impl TtsRepository for OpenAiTtsRepository {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn voice(&self) -> &str {
        &self.voice
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, ProviderError> {
        let start_time = std::time::Instant::now();
        let batches = split_into_batches(text, MAX_BATCH_SIZE);

        let mut merged_audio = Vec::new();
        for batch in &batches {
            merged_audio.extend(self.call_openai(batch).await?);
        }

        if merged_audio.is_empty() {
            return Err(ProviderError::EmptyResponse { provider: PROVIDER });
        }

        tracing::info!(
            provider = PROVIDER,
            model = %self.model,
            voice = %self.voice,
            latency_ms = start_time.elapsed().as_millis(),
            characters_count = text.chars().count(),
            batch_count = batches.len(),
            audio_size_bytes = merged_audio.len(),
            "Speech synthesis completed"
        );

        Ok(SynthesizedAudio::mp3(merged_audio))
    }
}
