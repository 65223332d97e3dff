use super::audio::{AudioHandle, AudioStore};
use super::error::VoiceServiceError;
use super::VoiceTier;
use crate::infrastructure::repositories::{
    BrowserSpeechRepository, ClientSpeech, ProviderError, SynthesizedAudio, TtsRepository,
};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const CACHE_CAPACITY: u64 = 100;
const CACHE_IDLE: Duration = Duration::from_secs(30 * 60);

/// Per-request inputs to the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakOptions {
    /// The limiter admitted this request for the premium tier
    pub allow_premium: bool,
    /// The visitor's browser reported `speechSynthesis` support
    pub browser_speech_supported: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Skipped { reason: String },
    Failed { error: String },
    Served,
}

/// One step of the fallback chain, in the order it ran
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAttempt {
    pub tier: VoiceTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<&'static str>,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
pub enum SpeechPayload {
    Audio(Arc<AudioHandle>),
    ClientSide(ClientSpeech),
}

#[derive(Debug)]
pub struct VoiceSynthesisResult {
    pub provider_used: VoiceTier,
    pub payload: SpeechPayload,
    pub attempts: Vec<TierAttempt>,
    /// Audio was replayed from the tier-2 cache, no provider call was made
    pub from_cache: bool,
}

/// Speaks text through premium voice, then standard TTS, then the browser.
///
/// Provider failures never escape: each becomes a failed attempt and the next
/// tier runs. The only error is the browser being unable to speak at the end.
pub struct VoiceSynthesisDispatcher {
    premium: Option<Arc<dyn TtsRepository>>,
    standard: Option<Arc<dyn TtsRepository>>,
    browser: BrowserSpeechRepository,
    audio_store: Arc<AudioStore>,
    cache: Option<Cache<String, SynthesizedAudio>>,
}

impl VoiceSynthesisDispatcher {
    pub fn new(
        premium: Option<Arc<dyn TtsRepository>>,
        standard: Option<Arc<dyn TtsRepository>>,
        browser: BrowserSpeechRepository,
        audio_store: Arc<AudioStore>,
        cache_enabled: bool,
    ) -> Self {
        // The welcome message is identical for every visitor
        let cache = if cache_enabled {
            Some(
                Cache::builder()
                    .max_capacity(CACHE_CAPACITY)
                    .time_to_idle(CACHE_IDLE)
                    .build(),
            )
        } else {
            None
        };

        Self {
            premium,
            standard,
            browser,
            audio_store,
            cache,
        }
    }

    pub fn audio_store(&self) -> &Arc<AudioStore> {
        &self.audio_store
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Provider behind each server-side tier, `None` when unconfigured
    pub fn configured_providers(&self) -> [(VoiceTier, Option<&'static str>); 2] {
        [
            (VoiceTier::Premium, self.premium.as_ref().map(|repo| repo.provider())),
            (VoiceTier::Standard, self.standard.as_ref().map(|repo| repo.provider())),
        ]
    }

    pub async fn speak(
        &self,
        text: &str,
        options: SpeakOptions,
    ) -> Result<VoiceSynthesisResult, VoiceServiceError> {
        if text.trim().is_empty() {
            return Err(VoiceServiceError::Invalid("Nothing to speak".to_string()));
        }

        let mut attempts = Vec::with_capacity(3);

        let premium = match (&self.premium, options.allow_premium) {
            (_, false) => Err("premium voice not allowed for this request"),
            (None, true) => Err("not configured"),
            (Some(repo), true) => Ok(repo),
        };
        if let Some((handle, from_cache)) = self
            .try_server_tier(VoiceTier::Premium, premium, text, &mut attempts)
            .await
        {
            return Ok(Self::served(
                VoiceTier::Premium,
                SpeechPayload::Audio(handle),
                attempts,
                from_cache,
            ));
        }

        let standard = self.standard.as_ref().ok_or("not configured");
        if let Some((handle, from_cache)) = self
            .try_server_tier(VoiceTier::Standard, standard, text, &mut attempts)
            .await
        {
            return Ok(Self::served(
                VoiceTier::Standard,
                SpeechPayload::Audio(handle),
                attempts,
                from_cache,
            ));
        }

        match self.browser.instruct(text, options.browser_speech_supported) {
            Some(speech) => {
                attempts.push(TierAttempt {
                    tier: VoiceTier::Browser,
                    provider: None,
                    outcome: AttemptOutcome::Served,
                });
                Ok(Self::served(
                    VoiceTier::Browser,
                    SpeechPayload::ClientSide(speech),
                    attempts,
                    false,
                ))
            }
            None => {
                attempts.push(TierAttempt {
                    tier: VoiceTier::Browser,
                    provider: None,
                    outcome: AttemptOutcome::Failed {
                        error: "speech synthesis unsupported".to_string(),
                    },
                });
                tracing::warn!(attempts = attempts.len(), "No voice tier could speak");
                Err(VoiceServiceError::SpeechNotSupported { attempts })
            }
        }
    }

    async fn try_server_tier(
        &self,
        tier: VoiceTier,
        repo: Result<&Arc<dyn TtsRepository>, &'static str>,
        text: &str,
        attempts: &mut Vec<TierAttempt>,
    ) -> Option<(Arc<AudioHandle>, bool)> {
        let repo = match repo {
            Ok(repo) => repo,
            Err(reason) => {
                attempts.push(TierAttempt {
                    tier,
                    provider: None,
                    outcome: AttemptOutcome::Skipped {
                        reason: reason.to_string(),
                    },
                });
                return None;
            }
        };

        let result = match tier {
            VoiceTier::Standard => self.synthesize_cached(repo.as_ref(), text).await,
            _ => repo.synthesize(text).await.map(|audio| (audio, false)),
        };

        match result {
            Ok((audio, from_cache)) => {
                attempts.push(TierAttempt {
                    tier,
                    provider: Some(repo.provider()),
                    outcome: AttemptOutcome::Served,
                });
                Some((self.audio_store.insert(tier, audio), from_cache))
            }
            Err(e) => {
                tracing::warn!(
                    tier = %tier,
                    provider = repo.provider(),
                    error = %e,
                    "Voice tier failed, falling back"
                );
                attempts.push(TierAttempt {
                    tier,
                    provider: Some(repo.provider()),
                    outcome: AttemptOutcome::Failed {
                        error: e.to_string(),
                    },
                });
                None
            }
        }
    }

    /// Tier-2 synthesis through the shared cache. The flag is true on a
    /// cache hit, so callers can skip the provider charge for replayed audio.
    async fn synthesize_cached(
        &self,
        repo: &dyn TtsRepository,
        text: &str,
    ) -> Result<(SynthesizedAudio, bool), ProviderError> {
        let Some(cache) = &self.cache else {
            return repo.synthesize(text).await.map(|audio| (audio, false));
        };

        let key = format!("{}:{}:{}", repo.provider(), repo.voice(), text);
        if let Some(cached) = cache.get(&key).await {
            tracing::debug!(
                provider = repo.provider(),
                audio_size = cached.data.len(),
                "Voice cache hit"
            );
            return Ok((cached, true));
        }

        let audio = repo.synthesize(text).await?;
        cache.insert(key, audio.clone()).await;
        Ok((audio, false))
    }

    fn served(
        provider_used: VoiceTier,
        payload: SpeechPayload,
        attempts: Vec<TierAttempt>,
        from_cache: bool,
    ) -> VoiceSynthesisResult {
        tracing::info!(
            provider_used = %provider_used,
            attempts = attempts.len(),
            from_cache = from_cache,
            "Speech served"
        );
        VoiceSynthesisResult {
            provider_used,
            payload,
            attempts,
            from_cache,
        }
    }
}
