//! Provider-agnostic message types for LLM communication.
//!
//! These types decouple the generation client from any specific LLM SDK.

use serde::{Deserialize, Serialize};

/// A chat completion request (provider-agnostic).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier (e.g., "meta-llama/Llama-3.2-3B-Instruct").
    pub model: String,
    /// Complete prompt, sent as a single user turn.
    pub prompt: String,
    /// Sampling temperature (0.0–2.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

/// Token usage statistics from a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// A chat completion response (provider-agnostic).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Generated text content.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Finish reason from the model (e.g., `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}
