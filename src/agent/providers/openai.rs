//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible chat completion API, including the
//! Hugging Face inference router, via the base URL in [`AgentConfig`].

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_trait::async_trait;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::AgentError;

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from agent configuration and a credential.
    #[must_use]
    pub fn new(config: &AgentConfig, api_key: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Wraps the prompt as the request's only (user) message.
    fn user_turn(prompt: &str) -> ChatCompletionRequestMessage {
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
            name: None,
        })
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    ///
    /// Uses the legacy `max_tokens` field: third-party inference routers
    /// accept it more widely than `max_completion_tokens`.
    #[allow(deprecated)]
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![Self::user_turn(&request.prompt)],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            ..Default::default()
        }
    }
}

/// Extracts an HTTP-ish status from an SDK error, when one is recoverable.
fn status_of(err: &OpenAIError) -> Option<u16> {
    match err {
        OpenAIError::Reqwest(e) => e.status().map(|s| s.as_u16()),
        _ => None,
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                status: status_of(&e),
                message: e.to_string(),
            })?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }
}
