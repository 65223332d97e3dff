pub mod browser_speech_repository;
pub mod chat_repository;
pub mod conversation_repository;
pub mod elevenlabs_voice_repository;
pub mod openai_chat_repository;
pub mod openai_tts_repository;
pub mod polly_tts_repository;
pub mod provider_error;
pub mod tts_repository;
pub mod usage_repository;

pub use browser_speech_repository::{BrowserSpeechRepository, ClientSpeech};
pub use chat_repository::{ChatRepository, ChatRole, ChatTurn};
pub use conversation_repository::ConversationRepository;
pub use elevenlabs_voice_repository::{ElevenLabsSettings, ElevenLabsVoiceRepository};
pub use openai_chat_repository::OpenAiChatRepository;
pub use openai_tts_repository::OpenAiTtsRepository;
pub use polly_tts_repository::PollyTtsRepository;
pub use provider_error::ProviderError;
pub use tts_repository::{SynthesizedAudio, TtsRepository};
pub use usage_repository::UsageRepository;
