use super::model::{ConversationSession, Message};
use crate::domain::usage::UsageSnapshot;
use crate::domain::voice::dto::SpeechResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response for POST /api/chat/conversations
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub usage: UsageSnapshot,
}

impl ConversationResponse {
    pub fn new(session: &ConversationSession, usage: UsageSnapshot) -> Self {
        Self {
            id: session.id,
            started_at: session.started_at,
            usage,
        }
    }
}

/// Request for POST /api/chat/conversations/:id/messages
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
    /// Speak the reply through the voice tiers
    #[serde(default)]
    pub speak: bool,
    #[serde(default = "default_prefer_premium")]
    pub prefer_premium: bool,
    #[serde(default)]
    pub browser_speech_supported: bool,
}

fn default_prefer_premium() -> bool {
    true
}

/// Response for POST /api/chat/conversations/:id/messages
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReplyResponse {
    pub conversation_id: Uuid,
    pub message: Message,
    pub reply: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechResponse>,
    /// Set when speech was requested but the policy or every tier refused it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_error: Option<String>,
    pub usage: UsageSnapshot,
}
