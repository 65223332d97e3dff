use super::dispatcher::{SpeechPayload, TierAttempt, VoiceSynthesisResult};
use super::VoiceTier;
use crate::domain::usage::UsageSnapshot;
use crate::infrastructure::repositories::ClientSpeech;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for POST /api/voice/speak
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default = "default_prefer_premium")]
    pub prefer_premium: bool,
    /// Feature-detected by the page right before the call
    #[serde(default)]
    pub browser_speech_supported: bool,
}

fn default_prefer_premium() -> bool {
    true
}

/// Where the browser fetches server-side audio from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub id: Uuid,
    pub url: String,
    pub content_type: String,
    pub size_bytes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpeechResponse {
    pub provider_used: VoiceTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_speech: Option<ClientSpeech>,
    pub attempts: Vec<serde_json::Value>,
}

impl SpeechResponse {
    pub fn from_result(result: &VoiceSynthesisResult) -> Self {
        let (audio, client_speech) = match &result.payload {
            SpeechPayload::Audio(handle) => (
                Some(AudioInfo {
                    id: handle.id(),
                    url: format!("/api/voice/audio/{}", handle.id()),
                    content_type: handle.content_type().to_string(),
                    size_bytes: handle.data().len(),
                }),
                None,
            ),
            SpeechPayload::ClientSide(speech) => (None, Some(speech.clone())),
        };

        Self {
            provider_used: result.provider_used,
            audio,
            client_speech,
            attempts: attempts_json(&result.attempts),
        }
    }
}

pub fn attempts_json(attempts: &[TierAttempt]) -> Vec<serde_json::Value> {
    attempts
        .iter()
        .filter_map(|attempt| serde_json::to_value(attempt).ok())
        .collect()
}

/// Response for POST /api/voice/speak
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakResponse {
    #[serde(flatten)]
    pub speech: SpeechResponse,
    pub usage: UsageSnapshot,
}

/// Response for audio release endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioReleaseResponse {
    pub id: Uuid,
    /// False when the audio had already been released
    pub released: bool,
}
