use crate::domain::visitor::VisitorId;
use crate::infrastructure::repositories::{ChatRole, ChatTurn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub used_premium_voice: bool,
    pub cost_usd: f64,
}

impl Message {
    pub fn user(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: Sender::User,
            timestamp: at,
            used_premium_voice: false,
            cost_usd: 0.0,
        }
    }

    pub fn assistant(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            sender: Sender::Assistant,
            ..Self::user(text, at)
        }
    }
}

/// A chat widget conversation, owned by the visitor that opened it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: Uuid,
    pub visitor: VisitorId,
    pub started_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl ConversationSession {
    pub fn new(visitor: VisitorId, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            visitor,
            started_at: at,
            messages: Vec::new(),
        }
    }

    pub fn is_owned_by(&self, visitor: &VisitorId) -> bool {
        &self.visitor == visitor
    }

    /// The last `limit` messages as completion turns, oldest first
    pub fn recent_turns(&self, limit: usize) -> Vec<ChatTurn> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages
            .iter()
            .skip(skip)
            .map(|message| {
                let role = match message.sender {
                    Sender::User => ChatRole::User,
                    Sender::Assistant => ChatRole::Assistant,
                };
                ChatTurn::new(role, message.text.clone())
            })
            .collect()
    }
}
