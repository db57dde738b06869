//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! A missing API key is not an error: the agent then runs in knowledge-only
//! mode and answers from retrieved documentation alone.

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::invoker::SuccessPolicy;
use crate::error::AgentError;

/// Default OpenAI-compatible inference router.
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/v1";
/// Default generation model.
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.2-3B-Instruct";

const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MCP_COMMAND: &str = "python3";
const DEFAULT_MCP_SCRIPT: &str = "mcp_server.py";
const DEFAULT_HISTORY_CAPACITY: usize = 3;
const DEFAULT_CALL_LOG_CAPACITY: usize = 20;
const DEFAULT_KNOWLEDGE_MAX_RESULTS: usize = 3;
const DEFAULT_SEARCH_MAX_RESULTS: usize = 5;
const DEFAULT_CONTEXT_TOP_K: usize = 3;
const DEFAULT_KNOWLEDGE_EXCERPT_CHARS: usize = 400;
const DEFAULT_RESPONSE_MAX_CHARS: usize = 500;

/// Confidence values attached to degraded or substituted responses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confidences {
    /// No generation backend configured.
    pub no_backend: f64,
    /// Backend reported it is still loading.
    pub warmup: f64,
    /// Any other generation failure.
    pub error: f64,
    /// Model output could not be parsed as JSON.
    pub parse_fallback: f64,
    /// Classification workflow substituted knowledge for a sentinel.
    pub knowledge_only: f64,
    /// Nothing to answer from: no search matches, or an empty query.
    pub no_match: f64,
    /// Session metrics count a turn as resolved only above this value.
    pub resolved_above: f64,
}

impl Default for Confidences {
    fn default() -> Self {
        Self {
            no_backend: 0.7,
            warmup: 0.5,
            error: 0.3,
            parse_fallback: 0.6,
            knowledge_only: 0.8,
            no_match: 0.0,
            resolved_above: 0.7,
        }
    }
}

/// Configuration for the support agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Generation provider name (`"openai"` or `"huggingface"`).
    pub provider: String,
    /// API key for the provider. `None` selects knowledge-only mode.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint.
    pub base_url: String,
    /// Generation model identifier.
    pub model: String,
    /// Maximum tokens per generation.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Deadline for a single generation request.
    pub generation_timeout: Duration,
    /// Deadline for a single tool call.
    pub tool_timeout: Duration,
    /// Executable that starts the MCP tool server.
    pub mcp_command: String,
    /// Arguments passed to the MCP tool server.
    pub mcp_args: Vec<String>,
    /// Number of conversation turns retained.
    pub history_capacity: usize,
    /// Number of tool call records retained.
    pub call_log_capacity: usize,
    /// `max_results` for the category knowledge tool.
    pub knowledge_max_results: usize,
    /// `max_results` for the search tool.
    pub search_max_results: usize,
    /// Matches folded into a direct-RAG prompt.
    pub context_top_k: usize,
    /// Characters of knowledge quoted when substituting for a sentinel.
    pub knowledge_excerpt_chars: usize,
    /// Maximum characters of a parsed response.
    pub response_max_chars: usize,
    /// Fallback confidence values.
    pub confidences: Confidences,
    /// How tool call success is judged for the call log.
    pub success_policy: SuccessPolicy,
    /// Look up customer emails and orders when a query mentions them.
    pub customer_context: bool,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if a value is out of range.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Whether a generation backend can be constructed.
    #[must_use]
    pub fn has_backend(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        // Defaults alone always validate.
        AgentConfigBuilder::default()
            .build()
            .unwrap_or_else(|_| unreachable!())
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    generation_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    mcp_command: Option<String>,
    mcp_args: Option<Vec<String>>,
    history_capacity: Option<usize>,
    call_log_capacity: Option<usize>,
    knowledge_max_results: Option<usize>,
    search_max_results: Option<usize>,
    context_top_k: Option<usize>,
    knowledge_excerpt_chars: Option<usize>,
    response_max_chars: Option<usize>,
    confidences: Option<Confidences>,
    success_policy: Option<SuccessPolicy>,
    customer_context: Option<bool>,
    prompt_dir: Option<PathBuf>,
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("OMNITECH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("HF_TOKEN")
                .or_else(|_| std::env::var("OMNITECH_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OMNITECH_BASE_URL").ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("OMNITECH_MODEL").ok();
        }
        if self.mcp_command.is_none() {
            self.mcp_command = std::env::var("OMNITECH_MCP_COMMAND").ok();
        }
        if self.mcp_args.is_none() {
            self.mcp_args = std::env::var("OMNITECH_MCP_ARGS")
                .ok()
                .map(|v| v.split_whitespace().map(str::to_string).collect());
        }
        if self.tool_timeout.is_none() {
            self.tool_timeout = env_secs("OMNITECH_TOOL_TIMEOUT_SECS");
        }
        if self.generation_timeout.is_none() {
            self.generation_timeout = env_secs("OMNITECH_GENERATION_TIMEOUT_SECS");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("OMNITECH_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        self
    }

    /// Sets the generation provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the generation model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum tokens per generation.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the generation deadline.
    #[must_use]
    pub const fn generation_timeout(mut self, d: Duration) -> Self {
        self.generation_timeout = Some(d);
        self
    }

    /// Sets the per-tool-call deadline.
    #[must_use]
    pub const fn tool_timeout(mut self, d: Duration) -> Self {
        self.tool_timeout = Some(d);
        self
    }

    /// Sets the MCP server command.
    #[must_use]
    pub fn mcp_command(mut self, cmd: impl Into<String>) -> Self {
        self.mcp_command = Some(cmd.into());
        self
    }

    /// Sets the MCP server arguments.
    #[must_use]
    pub fn mcp_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mcp_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the conversation history capacity.
    #[must_use]
    pub const fn history_capacity(mut self, n: usize) -> Self {
        self.history_capacity = Some(n);
        self
    }

    /// Sets the tool call log capacity.
    #[must_use]
    pub const fn call_log_capacity(mut self, n: usize) -> Self {
        self.call_log_capacity = Some(n);
        self
    }

    /// Sets `max_results` for category knowledge retrieval.
    #[must_use]
    pub const fn knowledge_max_results(mut self, n: usize) -> Self {
        self.knowledge_max_results = Some(n);
        self
    }

    /// Sets `max_results` for knowledge search.
    #[must_use]
    pub const fn search_max_results(mut self, n: usize) -> Self {
        self.search_max_results = Some(n);
        self
    }

    /// Sets how many search matches feed a direct-RAG prompt.
    #[must_use]
    pub const fn context_top_k(mut self, n: usize) -> Self {
        self.context_top_k = Some(n);
        self
    }

    /// Sets the excerpt length used when substituting knowledge.
    #[must_use]
    pub const fn knowledge_excerpt_chars(mut self, n: usize) -> Self {
        self.knowledge_excerpt_chars = Some(n);
        self
    }

    /// Sets the maximum parsed response length.
    #[must_use]
    pub const fn response_max_chars(mut self, n: usize) -> Self {
        self.response_max_chars = Some(n);
        self
    }

    /// Overrides the fallback confidence values.
    #[must_use]
    pub const fn confidences(mut self, c: Confidences) -> Self {
        self.confidences = Some(c);
        self
    }

    /// Sets the tool call success policy.
    #[must_use]
    pub const fn success_policy(mut self, policy: SuccessPolicy) -> Self {
        self.success_policy = Some(policy);
        self
    }

    /// Enables or disables customer email and order lookups.
    #[must_use]
    pub const fn customer_context(mut self, enabled: bool) -> Self {
        self.customer_context = Some(enabled);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] for zero capacities, zero timeouts,
    /// a temperature outside `0.0..=2.0`, or confidences outside `0.0..=1.0`.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let config = AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key: self.api_key.filter(|k| !k.trim().is_empty()),
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            generation_timeout: self
                .generation_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS)),
            tool_timeout: self
                .tool_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            mcp_command: self
                .mcp_command
                .unwrap_or_else(|| DEFAULT_MCP_COMMAND.to_string()),
            mcp_args: self
                .mcp_args
                .unwrap_or_else(|| vec![DEFAULT_MCP_SCRIPT.to_string()]),
            history_capacity: self.history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY),
            call_log_capacity: self.call_log_capacity.unwrap_or(DEFAULT_CALL_LOG_CAPACITY),
            knowledge_max_results: self
                .knowledge_max_results
                .unwrap_or(DEFAULT_KNOWLEDGE_MAX_RESULTS),
            search_max_results: self
                .search_max_results
                .unwrap_or(DEFAULT_SEARCH_MAX_RESULTS),
            context_top_k: self.context_top_k.unwrap_or(DEFAULT_CONTEXT_TOP_K),
            knowledge_excerpt_chars: self
                .knowledge_excerpt_chars
                .unwrap_or(DEFAULT_KNOWLEDGE_EXCERPT_CHARS),
            response_max_chars: self
                .response_max_chars
                .unwrap_or(DEFAULT_RESPONSE_MAX_CHARS),
            confidences: self.confidences.unwrap_or_default(),
            success_policy: self.success_policy.unwrap_or_default(),
            customer_context: self.customer_context.unwrap_or(true),
            prompt_dir: self.prompt_dir,
        };
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &AgentConfig) -> Result<(), AgentError> {
    let invalid = |message: &str| {
        Err(AgentError::Config {
            message: message.to_string(),
        })
    };

    if config.history_capacity == 0 {
        return invalid("history capacity must be at least 1");
    }
    if config.call_log_capacity == 0 {
        return invalid("call log capacity must be at least 1");
    }
    if config.response_max_chars == 0 {
        return invalid("response length limit must be at least 1");
    }
    if config.tool_timeout.is_zero() || config.generation_timeout.is_zero() {
        return invalid("timeouts must be non-zero");
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        return invalid("temperature must be within 0.0..=2.0");
    }
    if config.mcp_command.trim().is_empty() {
        return invalid("MCP server command must not be empty");
    }
    let c = config.confidences;
    let all = [
        c.no_backend,
        c.warmup,
        c.error,
        c.parse_fallback,
        c.knowledge_only,
        c.no_match,
        c.resolved_above,
    ];
    if all.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return invalid("confidence values must be within 0.0..=1.0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert!(config.api_key.is_none());
        assert!(!config.has_backend());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.call_log_capacity, 20);
        assert_eq!(config.knowledge_max_results, 3);
        assert_eq!(config.search_max_results, 5);
        assert_eq!(config.knowledge_excerpt_chars, 400);
        assert_eq!(config.response_max_chars, 500);
        assert_eq!(config.mcp_args, vec!["mcp_server.py".to_string()]);
        assert_eq!(config.success_policy, SuccessPolicy::EnvelopeTag);
        assert!(config.customer_context);
    }

    #[test]
    fn test_blank_api_key_means_no_backend() {
        let config = AgentConfig::builder()
            .api_key("   ")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(config.api_key.is_none());
        assert!(!config.has_backend());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("hf_test")
            .provider("huggingface")
            .model("Qwen/Qwen2.5-7B-Instruct")
            .mcp_command("uv")
            .mcp_args(["run", "server.py"])
            .tool_timeout(Duration::from_secs(5))
            .history_capacity(5)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(config.has_backend());
        assert_eq!(config.provider, "huggingface");
        assert_eq!(config.model, "Qwen/Qwen2.5-7B-Instruct");
        assert_eq!(config.mcp_command, "uv");
        assert_eq!(config.mcp_args, vec!["run", "server.py"]);
        assert_eq!(config.tool_timeout, Duration::from_secs(5));
        assert_eq!(config.history_capacity, 5);
    }

    #[test]
    fn test_zero_history_capacity_rejected() {
        let result = AgentConfig::builder().history_capacity(0).build();
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = AgentConfig::builder()
            .generation_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let result = AgentConfig::builder()
            .confidences(Confidences {
                warmup: 1.5,
                ..Confidences::default()
            })
            .build();
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_default_impl_matches_builder() {
        let config = AgentConfig::default();
        assert_eq!(config.confidences, Confidences::default());
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
    }
}
