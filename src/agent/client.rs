//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations.

use std::sync::Arc;

use tracing::warn;

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// Returns `Ok(None)` when no credential is configured; the agent then
/// answers from retrieved knowledge alone.
///
/// # Supported Providers
///
/// - `"openai"` (default): OpenAI-compatible APIs via `async-openai`
/// - `"huggingface"`: same client, pointed at the Hugging Face router
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &AgentConfig) -> Result<Option<Arc<dyn LlmProvider>>, AgentError> {
    if !matches!(config.provider.as_str(), "openai" | "huggingface") {
        return Err(AgentError::UnsupportedProvider {
            name: config.provider.clone(),
        });
    }

    let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        warn!("no API key configured, generation disabled (knowledge-only mode)");
        return Ok(None);
    };

    Ok(Some(Arc::new(OpenAiProvider::new(config, api_key))))
}
