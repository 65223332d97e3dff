use super::chat_repository::{ChatRepository, ChatRole, ChatTurn};
use super::provider_error::ProviderError;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;

const PROVIDER: &str = "openai";

/// Chat completions for the portfolio assistant
pub struct OpenAiChatRepository {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    temperature: f32,
}

impl OpenAiChatRepository {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }

    fn to_message(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage, OpenAIError> {
        let content = turn.content.clone();
        let message = match turn.role {
            ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()?
                .into(),
        };
        Ok(message)
    }
}

fn provider_error(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Reqwest(e) => ProviderError::Network {
            provider: PROVIDER,
            message: e.to_string(),
        },
        other => ProviderError::Other {
            provider: PROVIDER,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ChatRepository for OpenAiChatRepository {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, ProviderError> {
        let start_time = std::time::Instant::now();

        let messages = turns
            .iter()
            .map(Self::to_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(provider_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(provider_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            tracing::warn!(error = %e, model = %self.model, "OpenAI chat completion failed");
            provider_error(e)
        })?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::EmptyResponse { provider: PROVIDER })?;

        tracing::info!(
            provider = PROVIDER,
            model = %self.model,
            turns = turns.len(),
            reply_length = reply.len(),
            latency_ms = start_time.elapsed().as_millis(),
            "Chat completion received"
        );

        Ok(reply)
    }
}
