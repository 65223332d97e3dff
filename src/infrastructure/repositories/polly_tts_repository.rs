use super::provider_error::ProviderError;
use super::tts_repository::{SynthesizedAudio, TtsRepository};
use crate::domain::voice::text::split_into_batches;
use async_trait::async_trait;
use aws_sdk_polly::{
    types::{Engine, OutputFormat, VoiceId},
    Client as PollyClient,
};
use std::sync::Arc;

/// AWS Polly has a limit of 3000 characters per request
const MAX_BATCH_SIZE: usize = 3000;

const PROVIDER: &str = "polly";

/// AWS Polly implementation of the standard voice tier
pub struct PollyTtsRepository {
    polly_client: Arc<PollyClient>,
    voice_id: String,
}

impl PollyTtsRepository {
    pub fn new(polly_client: Arc<PollyClient>, voice_id: String) -> Self {
        Self {
            polly_client,
            voice_id,
        }
    }

    /// Call AWS Polly to synthesize a single text batch
    async fn call_polly(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let voice_id = VoiceId::from(self.voice_id.as_str());
        let engine = Engine::Neural;

        tracing::debug!(
            voice_id = ?voice_id,
            engine = ?engine,
            text_length = text.len(),
            "Calling AWS Polly synthesize_speech"
        );

        let result = self
            .polly_client
            .synthesize_speech()
            .text(text)
            .voice_id(voice_id)
            .output_format(OutputFormat::Mp3)
            .engine(engine)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    voice_id = %self.voice_id,
                    text_length = text.len(),
                    "AWS Polly synthesize_speech failed"
                );
                ProviderError::Other {
                    provider: PROVIDER,
                    message: format!("{:?}", e),
                }
            })?;

        let audio_stream = result.audio_stream.collect().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to collect audio stream from Polly response");
            ProviderError::Network {
                provider: PROVIDER,
                message: e.to_string(),
            }
        })?;

        Ok(audio_stream.into_bytes().to_vec())
    }
}

#[async_trait]
impl TtsRepository for PollyTtsRepository {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn voice(&self) -> &str {
        &self.voice_id
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, ProviderError> {
        let start_time = std::time::Instant::now();
        let batches = split_into_batches(text, MAX_BATCH_SIZE);

        let mut merged_audio = Vec::new();
        for (index, batch) in batches.iter().enumerate() {
            merged_audio.extend(self.call_polly(batch).await?);
            tracing::debug!(
                batch_index = index,
                total_audio_size = merged_audio.len(),
                "Batch synthesized and merged"
            );
        }

        if merged_audio.is_empty() {
            return Err(ProviderError::EmptyResponse { provider: PROVIDER });
        }

        tracing::info!(
            provider = PROVIDER,
            voice_id = %self.voice_id,
            latency_ms = start_time.elapsed().as_millis(),
            characters_count = text.chars().count(),
            batch_count = batches.len(),
            audio_size_bytes = merged_audio.len(),
            "Speech synthesis completed"
        );

        Ok(SynthesizedAudio::mp3(merged_audio))
    }
}
