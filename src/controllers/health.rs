use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::voice::{VoiceSynthesisDispatcher, VoiceTier};

/// What the readiness probe reports on
pub struct Readiness {
    pub chat_provider: Option<&'static str>,
    pub dispatcher: Arc<VoiceSynthesisDispatcher>,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// The gateway is always ready to answer: a missing provider only degrades
/// its tier. The body lists what is configured.
pub async fn health_ready(State(readiness): State<Arc<Readiness>>) -> impl IntoResponse {
    let mut voice = serde_json::Map::new();
    for (tier, provider) in readiness.dispatcher.configured_providers() {
        voice.insert(
            tier.as_str().to_string(),
            json!(provider.unwrap_or("not_configured")),
        );
    }
    voice.insert(VoiceTier::Browser.as_str().to_string(), json!("client"));

    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "chat": readiness.chat_provider.unwrap_or("not_configured"),
            "voice": voice,
            "voice_cache": readiness.dispatcher.cache_enabled(),
        })),
    )
}
