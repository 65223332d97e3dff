pub mod dto;
pub mod error;
pub mod model;
pub mod service;

pub use error::ChatServiceError;
pub use model::{ConversationSession, Message, Sender};
pub use service::{ChatReply, ChatService, ChatServiceApi, ChatSettings, ReplyVoice};
