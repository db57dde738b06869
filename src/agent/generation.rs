//! Generation client with user-safe fallbacks.
//!
//! [`GenerationClient::generate`] always returns text the response parser
//! can handle. Backend absence and failures are mapped to fixed JSON
//! payloads:
//!
//! | Condition                         | `response`             | confidence |
//! |-----------------------------------|------------------------|------------|
//! | no credential                     | [`KNOWLEDGE_BASE_ONLY`] | 0.7       |
//! | 503 / loading / warming up        | warm-up notice         | 0.5        |
//! | any other error, timeout, empty   | apology                | 0.3        |
//!
//! The orchestrator replaces the [`KNOWLEDGE_BASE_ONLY`] sentinel with an
//! excerpt of the retrieved knowledge.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info, warn};

use super::config::{AgentConfig, Confidences};
use super::message::ChatRequest;
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Sentinel response meaning "answer from retrieved knowledge only".
pub const KNOWLEDGE_BASE_ONLY: &str = "KNOWLEDGE_BASE_ONLY";

/// Shown while the hosted model is cold.
pub const WARMUP_MESSAGE: &str = "The AI model is warming up. Please try again in a moment.";

/// Shown for any other generation failure.
pub const APOLOGY_MESSAGE: &str =
    "I encountered an error generating a response. Please try again.";

const TRANSIENT_MARKERS: [&str; 3] = ["503", "loading", "warming up"];

/// Invokes the generation backend.
pub struct GenerationClient {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    confidences: Confidences,
}

impl GenerationClient {
    /// Creates a client; `provider = None` selects knowledge-only mode.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, config: &AgentConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.generation_timeout,
            confidences: config.confidences,
        }
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn has_backend(&self) -> bool {
        self.provider.is_some()
    }

    /// Generates raw text for `prompt`. Never fails.
    pub async fn generate(&self, prompt: &str) -> String {
        let Some(provider) = &self.provider else {
            debug!("no generation backend, answering from knowledge only");
            return fallback_payload(KNOWLEDGE_BASE_ONLY, self.confidences.no_backend);
        };

        let request = ChatRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };

        info!(
            provider = provider.name(),
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "calling generation backend"
        );
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, provider.chat(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout {
                operation: "generation".to_string(),
                after: self.timeout,
            }),
        };

        match outcome {
            Ok(response) if !response.content.trim().is_empty() => {
                info!(
                    chars = response.content.chars().count(),
                    total_tokens = response.usage.total_tokens,
                    finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "generation response received"
                );
                response.content
            }
            Ok(_) => {
                warn!("generation backend returned empty content");
                fallback_payload(APOLOGY_MESSAGE, self.confidences.error)
            }
            Err(e) if is_transient(&e) => {
                warn!(error = %e, "generation backend warming up");
                fallback_payload(WARMUP_MESSAGE, self.confidences.warmup)
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                fallback_payload(APOLOGY_MESSAGE, self.confidences.error)
            }
        }
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Whether an error means "model still loading, retry shortly".
fn is_transient(err: &AgentError) -> bool {
    match err {
        AgentError::ApiRequest { status: Some(503), .. } => true,
        AgentError::ApiRequest { message, .. } => {
            let lower = message.to_lowercase();
            TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
        }
        _ => false,
    }
}

fn fallback_payload(response: &str, confidence: f64) -> String {
    json!({
        "response": response,
        "action_needed": "none",
        "confidence": confidence,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{ChatResponse, TokenUsage};
    use crate::agent::parser::ResponseParser;
    use async_trait::async_trait;
    use test_case::test_case;

    enum Behavior {
        Reply(&'static str),
        Fail(&'static str, Option<u16>),
        Hang,
    }

    struct StubProvider(Behavior);

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            match self.0 {
                Behavior::Reply(text) => Ok(ChatResponse {
                    content: text.to_string(),
                    usage: TokenUsage::default(),
                    finish_reason: Some("stop".to_string()),
                }),
                Behavior::Fail(message, status) => Err(AgentError::ApiRequest {
                    message: message.to_string(),
                    status,
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }
    }

    fn client(behavior: Option<Behavior>) -> GenerationClient {
        let provider = behavior.map(|b| Arc::new(StubProvider(b)) as Arc<dyn LlmProvider>);
        GenerationClient::new(provider, &AgentConfig::default())
    }

    #[tokio::test]
    async fn test_no_backend_returns_sentinel() {
        let c = client(None);
        assert!(!c.has_backend());
        let fragment = ResponseParser::default().parse(&c.generate("hi").await);
        assert_eq!(fragment.response, KNOWLEDGE_BASE_ONLY);
        assert!((fragment.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_reply_passed_through() {
        let c = client(Some(Behavior::Reply("```json\n{}\n```")));
        assert_eq!(c.generate("hi").await, "```json\n{}\n```");
    }

    #[test_case("HTTP 503 Service Unavailable", None ; "status in text")]
    #[test_case("Model is currently Loading", None ; "loading")]
    #[test_case("model warming up", None ; "warming up")]
    #[test_case("upstream", Some(503) ; "status code")]
    #[tokio::test]
    async fn test_transient_errors_map_to_warmup(message: &'static str, status: Option<u16>) {
        let c = client(Some(Behavior::Fail(message, status)));
        let fragment = ResponseParser::default().parse(&c.generate("hi").await);
        assert_eq!(fragment.response, WARMUP_MESSAGE);
        assert!((fragment.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_other_errors_map_to_apology() {
        let c = client(Some(Behavior::Fail("401 Unauthorized", Some(401))));
        let fragment = ResponseParser::default().parse(&c.generate("hi").await);
        assert_eq!(fragment.response, APOLOGY_MESSAGE);
        assert!((fragment.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_reply_maps_to_apology() {
        let c = client(Some(Behavior::Reply("   ")));
        let fragment = ResponseParser::default().parse(&c.generate("hi").await);
        assert_eq!(fragment.response, APOLOGY_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_apology() {
        let c = client(Some(Behavior::Hang));
        let fragment = ResponseParser::default().parse(&c.generate("hi").await);
        assert_eq!(fragment.response, APOLOGY_MESSAGE);
    }
}
