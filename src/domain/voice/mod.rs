pub mod audio;
pub mod dispatcher;
pub mod dto;
pub mod error;
pub mod service;
pub mod text;

use serde::{Deserialize, Serialize};

pub use audio::{AudioHandle, AudioReleaser, AudioStore, ReleaseReason, TracingAudioReleaser};
pub use dispatcher::{
    AttemptOutcome, SpeakOptions, SpeechPayload, TierAttempt, VoiceSynthesisDispatcher,
    VoiceSynthesisResult,
};
pub use error::VoiceServiceError;
pub use service::{VoiceService, VoiceServiceApi};

/// Voice providers in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceTier {
    Premium,
    Standard,
    Browser,
}

impl VoiceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceTier::Premium => "premium",
            VoiceTier::Standard => "standard",
            VoiceTier::Browser => "browser",
        }
    }

    /// Tiers that produce server-side audio and carry an estimated cost
    pub fn is_paid(&self) -> bool {
        !matches!(self, VoiceTier::Browser)
    }
}

impl std::fmt::Display for VoiceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
