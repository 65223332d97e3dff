use super::audio::{AudioHandle, ReleaseReason};
use super::dispatcher::{SpeakOptions, VoiceSynthesisDispatcher, VoiceSynthesisResult};
use super::error::VoiceServiceError;
use super::text::prepare_for_speech;
use crate::domain::usage::{LimitDecision, UsageLimiter, UsageSnapshot};
use crate::domain::visitor::VisitorId;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub struct SpeakOutcome {
    pub result: VoiceSynthesisResult,
    pub usage: UsageSnapshot,
}

pub struct VoiceService {
    limiter: Arc<UsageLimiter>,
    dispatcher: Arc<VoiceSynthesisDispatcher>,
}

impl VoiceService {
    pub fn new(limiter: Arc<UsageLimiter>, dispatcher: Arc<VoiceSynthesisDispatcher>) -> Self {
        Self {
            limiter,
            dispatcher,
        }
    }
}

#[async_trait]
pub trait VoiceServiceApi: Send + Sync {
    /// Speak a text for a visitor
    ///
    /// This operation:
    /// - Prepares the text for speech
    /// - Checks the usage policy, degrading premium to standard voice if needed
    /// - Runs the tier fallback chain
    /// - Records usage once, against the tier that served
    async fn speak(
        &self,
        visitor: &VisitorId,
        text: &str,
        prefer_premium: bool,
        browser_speech_supported: bool,
    ) -> Result<SpeakOutcome, VoiceServiceError>;

    fn audio(&self, id: Uuid) -> Result<Arc<AudioHandle>, VoiceServiceError>;

    /// Release audio after playback ended or was stopped.
    /// Returns false if it was unknown or had already been released.
    fn finish_audio(&self, id: Uuid, reason: ReleaseReason) -> bool;
}

#[async_trait]
impl VoiceServiceApi for VoiceService {
    async fn speak(
        &self,
        visitor: &VisitorId,
        text: &str,
        prefer_premium: bool,
        browser_speech_supported: bool,
    ) -> Result<SpeakOutcome, VoiceServiceError> {
        let prepared = prepare_for_speech(text);
        if prepared.is_empty() {
            return Err(VoiceServiceError::Invalid(
                "Text has nothing to speak".to_string(),
            ));
        }

        tracing::info!(
            visitor = %visitor,
            original_length = text.len(),
            prepared_length = prepared.len(),
            prefer_premium = prefer_premium,
            "Voice request"
        );

        let admission = match self
            .limiter
            .check_voice_limit(visitor, &prepared, prefer_premium)
        {
            LimitDecision::Allowed(admission) => admission,
            LimitDecision::Denied(denial) => return Err(VoiceServiceError::LimitExceeded(denial)),
        };

        let options = SpeakOptions {
            allow_premium: admission.allows_premium_voice(),
            browser_speech_supported,
        };

        // A failed request drops the admission unrecorded
        let result = self.dispatcher.speak(&prepared, options).await?;
        let admission = if result.from_cache {
            admission.served_from_cache()
        } else {
            admission
        };
        let usage = self.limiter.record_usage(admission, Some(result.provider_used));

        Ok(SpeakOutcome { result, usage })
    }

    fn audio(&self, id: Uuid) -> Result<Arc<AudioHandle>, VoiceServiceError> {
        self.dispatcher
            .audio_store()
            .get(&id)
            .ok_or_else(|| VoiceServiceError::AudioNotFound(id.to_string()))
    }

    fn finish_audio(&self, id: Uuid, reason: ReleaseReason) -> bool {
        let released = self.dispatcher.audio_store().finish(&id, reason);
        tracing::debug!(audio_id = %id, reason = ?reason, released = released, "Audio finished");
        released
    }
}
