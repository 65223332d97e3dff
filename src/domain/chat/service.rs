use super::error::ChatServiceError;
use super::model::{ConversationSession, Message};
use crate::domain::usage::{Admission, Clock, LimitDecision, UsageLimiter, UsageSnapshot};
use crate::domain::visitor::VisitorId;
use crate::domain::voice::text::prepare_for_speech;
use crate::domain::voice::{SpeakOptions, VoiceSynthesisDispatcher, VoiceSynthesisResult, VoiceTier};
use crate::infrastructure::repositories::{ChatRepository, ChatRole, ChatTurn, ConversationRepository};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// How the visitor wants the reply spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyVoice {
    pub prefer_premium: bool,
    pub browser_speech_supported: bool,
}

#[derive(Debug)]
pub struct ChatReply {
    pub conversation_id: Uuid,
    pub message: Message,
    pub reply: Message,
    pub speech: Option<VoiceSynthesisResult>,
    pub speech_error: Option<String>,
    pub usage: UsageSnapshot,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub system_prompt: String,
    /// Most recent messages sent along with each new one
    pub history_turns: usize,
}

pub struct ChatService {
    limiter: Arc<UsageLimiter>,
    conversations: Arc<ConversationRepository>,
    chat_repo: Option<Arc<dyn ChatRepository>>,
    dispatcher: Arc<VoiceSynthesisDispatcher>,
    clock: Arc<dyn Clock>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        limiter: Arc<UsageLimiter>,
        conversations: Arc<ConversationRepository>,
        chat_repo: Option<Arc<dyn ChatRepository>>,
        dispatcher: Arc<VoiceSynthesisDispatcher>,
        clock: Arc<dyn Clock>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            limiter,
            conversations,
            chat_repo,
            dispatcher,
            clock,
            settings,
        }
    }
}

#[async_trait]
pub trait ChatServiceApi: Send + Sync {
    /// Open a conversation if the visitor's conversation caps allow it
    async fn start_conversation(
        &self,
        visitor: &VisitorId,
    ) -> Result<(ConversationSession, UsageSnapshot), ChatServiceError>;

    /// Send a message and get the assistant's reply
    ///
    /// This operation:
    /// - Checks the usage policy for the message
    /// - Asks the chat provider, with the system prompt and recent history
    /// - Optionally speaks the reply, once the policy admits the reply's
    ///   own length at the tier it may use
    /// - Records usage exactly once, only after a reply was produced
    async fn send_message(
        &self,
        visitor: &VisitorId,
        conversation_id: Uuid,
        text: &str,
        voice: Option<ReplyVoice>,
    ) -> Result<ChatReply, ChatServiceError>;

    async fn end_conversation(
        &self,
        visitor: &VisitorId,
        conversation_id: Uuid,
    ) -> Result<(), ChatServiceError>;
}

#[async_trait]
impl ChatServiceApi for ChatService {
    async fn start_conversation(
        &self,
        visitor: &VisitorId,
    ) -> Result<(ConversationSession, UsageSnapshot), ChatServiceError> {
        if !self.limiter.start_conversation(visitor) {
            return Err(ChatServiceError::LimitExceeded(
                self.limiter.conversation_denial(visitor),
            ));
        }

        let session = ConversationSession::new(visitor.clone(), self.clock.now());
        self.conversations.insert(session.clone()).await;

        tracing::info!(
            visitor = %visitor,
            conversation_id = %session.id,
            "Conversation started"
        );

        Ok((session, self.limiter.usage(visitor)))
    }

    async fn send_message(
        &self,
        visitor: &VisitorId,
        conversation_id: Uuid,
        text: &str,
        voice: Option<ReplyVoice>,
    ) -> Result<ChatReply, ChatServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatServiceError::Invalid("Message is empty".to_string()));
        }

        let session = self.owned_session(visitor, &conversation_id).await?;
        let chat_repo = self
            .chat_repo
            .as_ref()
            .ok_or(ChatServiceError::NotConfigured)?;

        let admission = match self.limiter.check_limit(visitor, text, false) {
            LimitDecision::Allowed(admission) => admission,
            LimitDecision::Denied(denial) => return Err(ChatServiceError::LimitExceeded(denial)),
        };

        let turns = self.build_turns(&session, text);
        // Dropping the admission here leaves the counters untouched
        let reply_text = chat_repo.complete(&turns).await.map_err(|e| {
            tracing::warn!(
                visitor = %visitor,
                conversation_id = %conversation_id,
                provider = chat_repo.provider(),
                error = %e,
                "Chat provider failed"
            );
            ChatServiceError::Provider
        })?;

        let (admission, speech, speech_error) = match voice {
            Some(voice) => self.speak_reply(admission, &reply_text, voice).await,
            None => (admission, None, None),
        };

        let served_by = speech.as_ref().map(|result| result.provider_used);
        let cost_usd = self.limiter.charge_for(&admission, served_by);
        let usage = self.limiter.record_usage(admission, served_by);

        let now = self.clock.now();
        let message = Message::user(text, now);
        let reply = Message {
            used_premium_voice: served_by == Some(VoiceTier::Premium),
            cost_usd,
            ..Message::assistant(reply_text, now)
        };

        {
            let mut session = session.lock();
            session.messages.push(message.clone());
            session.messages.push(reply.clone());
        }

        tracing::info!(
            visitor = %visitor,
            conversation_id = %conversation_id,
            served_by = ?served_by,
            session_characters = usage.session_characters,
            "Chat message answered"
        );

        Ok(ChatReply {
            conversation_id,
            message,
            reply,
            speech,
            speech_error,
            usage,
        })
    }

    async fn end_conversation(
        &self,
        visitor: &VisitorId,
        conversation_id: Uuid,
    ) -> Result<(), ChatServiceError> {
        self.owned_session(visitor, &conversation_id).await?;
        self.conversations.remove(&conversation_id).await;

        tracing::info!(
            visitor = %visitor,
            conversation_id = %conversation_id,
            "Conversation ended"
        );
        Ok(())
    }
}

impl ChatService {
    /// Conversations of other visitors are reported as missing
    async fn owned_session(
        &self,
        visitor: &VisitorId,
        conversation_id: &Uuid,
    ) -> Result<Arc<Mutex<ConversationSession>>, ChatServiceError> {
        self.conversations
            .find(conversation_id)
            .await
            .filter(|session| session.lock().is_owned_by(visitor))
            .ok_or_else(|| ChatServiceError::NotFound(conversation_id.to_string()))
    }

    fn build_turns(&self, session: &Mutex<ConversationSession>, text: &str) -> Vec<ChatTurn> {
        let history = session.lock().recent_turns(self.settings.history_turns);

        let mut turns = Vec::with_capacity(history.len() + 2);
        turns.push(ChatTurn::new(ChatRole::System, self.settings.system_prompt.clone()));
        turns.extend(history);
        turns.push(ChatTurn::new(ChatRole::User, text));
        turns
    }

    /// Speak the reply if the policy admits its length. The returned
    /// admission covers whatever was actually admitted.
    async fn speak_reply(
        &self,
        admission: Admission,
        reply: &str,
        voice: ReplyVoice,
    ) -> (Admission, Option<VoiceSynthesisResult>, Option<String>) {
        let prepared = prepare_for_speech(reply);
        if prepared.is_empty() {
            return (admission, None, None);
        }

        let admission = match self
            .limiter
            .admit_reply_speech(admission, &prepared, voice.prefer_premium)
        {
            Ok(admission) => admission,
            Err((admission, denial)) => return (admission, None, Some(denial.reason)),
        };

        let options = SpeakOptions {
            allow_premium: admission.allows_premium_voice(),
            browser_speech_supported: voice.browser_speech_supported,
        };
        match self.dispatcher.speak(&prepared, options).await {
            Ok(result) if result.from_cache => (admission.served_from_cache(), Some(result), None),
            Ok(result) => (admission, Some(result), None),
            Err(e) => {
                tracing::warn!(error = %e, "Reply could not be spoken");
                (admission, None, Some(e.to_string()))
            }
        }
    }
}
