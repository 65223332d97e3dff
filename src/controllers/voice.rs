use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::voice::{
        dto::{AudioReleaseResponse, SpeakRequest, SpeakResponse, SpeechResponse},
        ReleaseReason, VoiceService, VoiceServiceApi,
    },
    error::{AppError, AppResult},
    infrastructure::visitor::CurrentVisitor,
};

pub struct VoiceController {
    voice_service: Arc<VoiceService>,
}

impl VoiceController {
    pub fn new(voice_service: Arc<VoiceService>) -> Self {
        Self { voice_service }
    }

    /// POST /api/voice/speak - Speak text through the voice tiers
    pub async fn speak(
        State(controller): State<Arc<VoiceController>>,
        Extension(CurrentVisitor(visitor)): Extension<CurrentVisitor>,
        Json(request): Json<SpeakRequest>,
    ) -> AppResult<Json<SpeakResponse>> {
        if request.text.trim().is_empty() {
            return Err(AppError::BadRequest("Text cannot be empty".to_string()));
        }

        let outcome = controller
            .voice_service
            .speak(
                &visitor,
                &request.text,
                request.prefer_premium,
                request.browser_speech_supported,
            )
            .await?;

        Ok(Json(SpeakResponse {
            speech: SpeechResponse::from_result(&outcome.result),
            usage: outcome.usage,
        }))
    }

    /// GET /api/voice/audio/:id - Audio bytes for a server-side tier
    pub async fn get_audio(
        State(controller): State<Arc<VoiceController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let handle = controller.voice_service.audio(id)?;

        let mut headers = HeaderMap::new();
        let content_type = HeaderValue::from_str(handle.content_type())
            .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(
            "X-Voice-Tier",
            HeaderValue::from_static(handle.tier().as_str()),
        );

        Ok((StatusCode::OK, headers, Body::from(handle.data().to_vec())))
    }

    /// POST /api/voice/audio/:id/ended - Playback finished
    pub async fn audio_ended(
        State(controller): State<Arc<VoiceController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Json<AudioReleaseResponse>> {
        let released = controller.voice_service.finish_audio(id, ReleaseReason::Ended);
        Ok(Json(AudioReleaseResponse { id, released }))
    }

    /// DELETE /api/voice/audio/:id - Playback stopped by the visitor
    pub async fn stop_audio(
        State(controller): State<Arc<VoiceController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Json<AudioReleaseResponse>> {
        let released = controller.voice_service.finish_audio(id, ReleaseReason::Stopped);
        Ok(Json(AudioReleaseResponse { id, released }))
    }
}
