use async_trait::async_trait;
use parking_lot::Mutex;
use portfolio_voice_gateway::infrastructure::repositories::{
    ChatRepository, ChatRole, ChatTurn, ProviderError, SynthesizedAudio, TtsRepository,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Voice provider that returns the text's bytes as audio
pub struct MockVoice {
    name: &'static str,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockVoice {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TtsRepository for MockVoice {
    fn provider(&self) -> &'static str {
        self.name
    }

    fn voice(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                provider: self.name,
                status: 503,
                message: "mock outage".to_string(),
            });
        }
        Ok(SynthesizedAudio::mp3(
            format!("{}:{}", self.name, text).into_bytes(),
        ))
    }
}

/// Chat provider that echoes the latest user turn, unless given a reply
pub struct MockChat {
    failing: AtomicBool,
    reply: Mutex<Option<String>>,
    received: Mutex<Vec<Vec<ChatTurn>>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            reply: Mutex::new(None),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: impl Into<String>) {
        *self.reply.lock() = Some(reply.into());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Turns sent on the most recent call
    pub fn last_turns(&self) -> Vec<ChatTurn> {
        self.received.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatRepository for MockChat {
    fn provider(&self) -> &'static str {
        "mock-chat"
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, ProviderError> {
        self.received.lock().push(turns.to_vec());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Network {
                provider: "mock-chat",
                message: "connection reset".to_string(),
            });
        }

        if let Some(reply) = self.reply.lock().clone() {
            return Ok(reply);
        }

        let last = turns
            .iter()
            .rev()
            .find(|turn| turn.role == ChatRole::User)
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();
        Ok(format!("You said: {}", last))
    }
}
