use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        chat::{
            dto::{ChatReplyResponse, ConversationResponse, SendMessageRequest},
            ChatService, ChatServiceApi, ReplyVoice,
        },
        voice::dto::SpeechResponse,
    },
    error::AppResult,
    infrastructure::visitor::CurrentVisitor,
};

pub struct ChatController {
    chat_service: Arc<ChatService>,
}

impl ChatController {
    pub fn new(chat_service: Arc<ChatService>) -> Self {
        Self { chat_service }
    }

    /// POST /api/chat/conversations - Start a conversation
    pub async fn start_conversation(
        State(controller): State<Arc<ChatController>>,
        Extension(CurrentVisitor(visitor)): Extension<CurrentVisitor>,
    ) -> AppResult<(StatusCode, Json<ConversationResponse>)> {
        let (session, usage) = controller.chat_service.start_conversation(&visitor).await?;
        Ok((
            StatusCode::CREATED,
            Json(ConversationResponse::new(&session, usage)),
        ))
    }

    /// POST /api/chat/conversations/:id/messages - Send a message
    pub async fn send_message(
        State(controller): State<Arc<ChatController>>,
        Extension(CurrentVisitor(visitor)): Extension<CurrentVisitor>,
        Path(conversation_id): Path<Uuid>,
        Json(request): Json<SendMessageRequest>,
    ) -> AppResult<Json<ChatReplyResponse>> {
        let voice = request.speak.then_some(ReplyVoice {
            prefer_premium: request.prefer_premium,
            browser_speech_supported: request.browser_speech_supported,
        });

        let reply = controller
            .chat_service
            .send_message(&visitor, conversation_id, &request.text, voice)
            .await?;

        Ok(Json(ChatReplyResponse {
            conversation_id: reply.conversation_id,
            speech: reply.speech.as_ref().map(SpeechResponse::from_result),
            message: reply.message,
            reply: reply.reply,
            speech_error: reply.speech_error,
            usage: reply.usage,
        }))
    }

    /// DELETE /api/chat/conversations/:id - End a conversation
    pub async fn end_conversation(
        State(controller): State<Arc<ChatController>>,
        Extension(CurrentVisitor(visitor)): Extension<CurrentVisitor>,
        Path(conversation_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        controller
            .chat_service
            .end_conversation(&visitor, conversation_id)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
