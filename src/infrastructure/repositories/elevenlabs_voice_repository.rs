use super::provider_error::ProviderError;
use super::tts_repository::{SynthesizedAudio, TtsRepository};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;

const XI_API_KEY_HEADER: &str = "xi-api-key";
const PROVIDER: &str = "elevenlabs";

/// ElevenLabs accepts up to 5000 characters per request. Longer text, such
/// as a long chat reply, fails this tier and falls through to standard voice,
/// which splits it into batches.
const MAX_TEXT_LENGTH: usize = 5000;

#[derive(Debug, Clone)]
pub struct ElevenLabsSettings {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct TextToSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// Premium conversational voice over the ElevenLabs text-to-speech endpoint
pub struct ElevenLabsVoiceRepository {
    inner: reqwest::Client,
    settings: ElevenLabsSettings,
}

impl ElevenLabsVoiceRepository {
    pub fn new(settings: ElevenLabsSettings) -> Result<Self, ProviderError> {
        let inner = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProviderError::Other {
                provider: PROVIDER,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { inner, settings })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.voice_id
        )
    }
}

#[async_trait]
impl TtsRepository for ElevenLabsVoiceRepository {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn voice(&self) -> &str {
        &self.settings.voice_id
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, ProviderError> {
        if text.chars().count() > MAX_TEXT_LENGTH {
            return Err(ProviderError::Other {
                provider: PROVIDER,
                message: format!("text exceeds {} characters", MAX_TEXT_LENGTH),
            });
        }

        let start_time = std::time::Instant::now();
        let body = TextToSpeechBody {
            text,
            model_id: &self.settings.model_id,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let response = self
            .inner
            .post(self.url())
            .query(&[("output_format", "mp3_44100_128")])
            .header(XI_API_KEY_HEADER, &self.settings.api_key)
            .header(ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, provider = PROVIDER, "Premium voice request failed");
                ProviderError::Network {
                    provider: PROVIDER,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                provider = PROVIDER,
                "Premium voice provider rejected the request"
            );
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();

        let data = response.bytes().await.map_err(|e| ProviderError::Network {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        if data.is_empty() {
            return Err(ProviderError::EmptyResponse { provider: PROVIDER });
        }

        tracing::info!(
            provider = PROVIDER,
            voice_id = %self.settings.voice_id,
            latency_ms = start_time.elapsed().as_millis(),
            characters_count = text.chars().count(),
            audio_size_bytes = data.len(),
            "Speech synthesis completed"
        );

        Ok(SynthesizedAudio {
            data: data.to_vec(),
            content_type,
        })
    }
}
