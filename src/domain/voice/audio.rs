use super::VoiceTier;
use crate::infrastructure::repositories::SynthesizedAudio;
use chrono::{DateTime, Utc};
use moka::notification::RemovalCause;
use moka::sync::Cache;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_STORED_HANDLES: u64 = 1_000;

/// What ended an audio handle's life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseReason {
    /// Playback reached the end
    Ended,
    /// The listener stopped playback early
    Stopped,
    /// Playback or delivery failed
    Error,
    /// Never played within the retention window
    Expired,
    /// Last reference went away without an explicit release
    Dropped,
}

/// Receives exactly one notification per audio handle
pub trait AudioReleaser: Send + Sync {
    fn release(&self, id: Uuid, tier: VoiceTier, reason: ReleaseReason);
}

pub struct TracingAudioReleaser;

impl AudioReleaser for TracingAudioReleaser {
    fn release(&self, id: Uuid, tier: VoiceTier, reason: ReleaseReason) {
        tracing::debug!(audio_id = %id, tier = %tier, reason = ?reason, "Audio released");
    }
}

/// Playable audio produced by a server-side voice tier.
///
/// Released exactly once, by whichever of `release` or `Drop` runs first.
pub struct AudioHandle {
    id: Uuid,
    tier: VoiceTier,
    content_type: String,
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    released: AtomicBool,
    releaser: Arc<dyn AudioReleaser>,
}

impl AudioHandle {
    pub fn new(tier: VoiceTier, audio: SynthesizedAudio, releaser: Arc<dyn AudioReleaser>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tier,
            content_type: audio.content_type,
            data: audio.data,
            created_at: Utc::now(),
            released: AtomicBool::new(false),
            releaser,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tier(&self) -> VoiceTier {
        self.tier
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Returns false if the handle was already released
    pub fn release(&self, reason: ReleaseReason) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.releaser.release(self.id, self.tier, reason);
        true
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.release(ReleaseReason::Dropped);
    }
}

impl std::fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioHandle")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Audio waiting to be fetched and played by the browser.
///
/// Handles not finished within the TTL are evicted and released as expired.
pub struct AudioStore {
    handles: Cache<Uuid, Arc<AudioHandle>>,
    releaser: Arc<dyn AudioReleaser>,
}

impl AudioStore {
    pub fn new(releaser: Arc<dyn AudioReleaser>, ttl: Duration) -> Self {
        let handles = Cache::builder()
            .max_capacity(MAX_STORED_HANDLES)
            .time_to_live(ttl)
            .eviction_listener(|_id, handle: Arc<AudioHandle>, cause| {
                if matches!(cause, RemovalCause::Expired | RemovalCause::Size) {
                    handle.release(ReleaseReason::Expired);
                }
            })
            .build();

        Self { handles, releaser }
    }

    pub fn insert(&self, tier: VoiceTier, audio: SynthesizedAudio) -> Arc<AudioHandle> {
        let handle = Arc::new(AudioHandle::new(tier, audio, Arc::clone(&self.releaser)));
        self.handles.insert(handle.id(), Arc::clone(&handle));
        handle
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<AudioHandle>> {
        self.handles.get(id)
    }

    /// Remove and release a handle. False if it is unknown or already released.
    pub fn finish(&self, id: &Uuid, reason: ReleaseReason) -> bool {
        match self.handles.remove(id) {
            Some(handle) => handle.release(reason),
            None => false,
        }
    }

    /// Apply pending expirations now
    pub fn purge_expired(&self) {
        self.handles.run_pending_tasks();
    }

    pub fn len(&self) -> u64 {
        self.handles.run_pending_tasks();
        self.handles.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
