//! Query orchestration: routing, workflow sequencing, result assembly.
//!
//! ```text
//! query → QueryRouter
//!   ├── support     → classify → template → knowledge → generate → parse
//!   └── exploratory → search → generate → parse
//! ```
//!
//! Steps within a turn run strictly in order. Whole turns are serialized
//! by an async turn lock so history updates never interleave; the history
//! and metrics mutexes are never held across an await.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::client::create_provider;
use super::config::AgentConfig;
use super::context::{LookupKind, detect_lookups};
use super::generation::{GenerationClient, KNOWLEDGE_BASE_ONLY};
use super::history::{ConversationHistory, ConversationTurn};
use super::invoker::{ToolCallRecord, ToolInvoker};
use super::metrics::SessionMetrics;
use super::parser::{ResponseParser, truncate_chars};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::result::{
    ActionNeeded, AgentResult, Classification, ClassificationResult, DirectRagResult,
    ResponseFragment, clamp_confidence, dedup_sources,
};
use super::router::{QueryRouter, Route};
use super::tool::{ToolDescriptor, ToolOutput, ToolTransport};
use crate::error::AgentError;
use crate::mcp::McpToolTransport;
use crate::mcp::params::{
    ClassificationPayload, ClassifyParams, KnowledgeMatch, KnowledgeParams, KnowledgePayload,
    LookupParams, SearchParams, SearchPayload, TemplateParams, TemplatePayload, decode,
    tool_names,
};

/// Knowledge placeholder when retrieval yields nothing.
pub const NO_DOCUMENTATION: &str = "No documentation found.";
/// Response when a search returns no matches.
pub const NO_MATCHES_RESPONSE: &str =
    "I couldn't find relevant information. Please try rephrasing.";
/// Response when the classification step fails.
pub const CLASSIFICATION_ERROR_RESPONSE: &str = "I encountered an error. Please try again.";
/// Response to an empty query.
pub const EMPTY_QUERY_RESPONSE: &str = "Please enter a question.";
/// Response to a query over the length limit.
pub const LONG_QUERY_RESPONSE: &str = "Your question is too long. Please shorten it and try again.";

const MATCH_SEPARATOR: &str = "\n\n---\n\n";
const MAX_QUERY_CHARS: usize = 10_000;

/// Orchestrates support queries over a tool server and a generation backend.
pub struct Orchestrator {
    invoker: ToolInvoker,
    generation: GenerationClient,
    parser: ResponseParser,
    router: QueryRouter,
    prompts: PromptSet,
    history: Mutex<ConversationHistory>,
    metrics: Mutex<SessionMetrics>,
    turn_lock: AsyncMutex<()>,
    tools: Vec<ToolDescriptor>,
    config: AgentConfig,
}

impl Orchestrator {
    /// Creates an orchestrator over existing collaborators.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling
    /// back to compiled-in defaults. `provider = None` selects
    /// knowledge-only mode.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ToolTransport>,
        provider: Option<Arc<dyn LlmProvider>>,
        config: AgentConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            invoker: ToolInvoker::new(
                transport,
                config.call_log_capacity,
                config.success_policy,
                config.tool_timeout,
            ),
            generation: GenerationClient::new(provider, &config),
            parser: ResponseParser::new(
                config.response_max_chars,
                config.confidences.parse_fallback,
            ),
            router: QueryRouter::default(),
            prompts,
            history: Mutex::new(ConversationHistory::new(config.history_capacity)),
            metrics: Mutex::new(SessionMetrics::default()),
            turn_lock: AsyncMutex::new(()),
            tools: Vec::new(),
            config,
        }
    }

    /// Spawns the configured MCP server, connects, and discovers its tools.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connection`] if the server cannot be started or
    /// does not answer tool discovery, and [`AgentError::UnsupportedProvider`]
    /// for an unknown generation provider.
    pub async fn connect(config: AgentConfig) -> Result<Self, AgentError> {
        let provider = create_provider(&config)?;
        let transport = McpToolTransport::spawn(&config.mcp_command, &config.mcp_args).await?;
        let mut orchestrator = Self::new(Arc::new(transport), provider, config);
        orchestrator.discover_tools().await?;
        Ok(orchestrator)
    }

    /// Lists the server's tools and remembers them.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connection`] if listing fails; the transport is
    /// closed first.
    pub async fn discover_tools(&mut self) -> Result<(), AgentError> {
        match self.invoker.list_tools().await {
            Ok(tools) => {
                self.tools = tools;
                Ok(())
            }
            Err(e) => {
                let _ = self.invoker.shutdown().await;
                Err(AgentError::Connection {
                    message: format!("tool discovery failed: {e}"),
                })
            }
        }
    }

    /// Replaces the query router.
    #[must_use]
    pub fn with_router(mut self, router: QueryRouter) -> Self {
        self.router = router;
        self
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Processes one customer query. Never fails.
    ///
    /// Successful turns are appended to the conversation history; every
    /// turn is counted in the session metrics.
    pub async fn process(&self, query: &str) -> AgentResult {
        let _turn = self.turn_lock.lock().await;

        if query.trim().is_empty() {
            return self.rejected_query(EMPTY_QUERY_RESPONSE, "query is empty");
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return self.rejected_query(
                LONG_QUERY_RESPONSE,
                &format!("query exceeds maximum length ({MAX_QUERY_CHARS} characters)"),
            );
        }

        let result = match self.router.route(query) {
            Route::Support(signal) => {
                info!(?signal, "support query, running classification workflow");
                self.run_classification(query).await
            }
            Route::Exploratory => {
                info!("exploratory query, running direct RAG workflow");
                self.run_direct_rag(query).await
            }
        };

        if result.error().is_none() {
            lock(&self.history).append(ConversationTurn::new(query, result.response()));
        }
        lock(&self.metrics).record(&result, self.config.confidences.resolved_above);

        info!(
            workflow = %result.workflow(),
            action_needed = %result.action_needed(),
            confidence = result.confidence(),
            sources = result.sources().len(),
            "query processed"
        );
        result
    }

    fn rejected_query(&self, response: &str, reason: &str) -> AgentResult {
        warn!(reason, "query rejected");
        AgentResult::DirectRag(DirectRagResult {
            base: ResponseFragment::new(
                response,
                ActionNeeded::None,
                self.config.confidences.no_match,
            ),
            sources: Vec::new(),
            llm_prompt: None,
            error: Some(reason.to_string()),
        })
    }

    fn history_section(&self) -> Option<String> {
        lock(&self.history).render()
    }

    #[allow(clippy::too_many_lines)]
    async fn run_classification(&self, query: &str) -> AgentResult {
        let mut workflow_log: Vec<String> = Vec::new();

        // Step 1: Classify (terminal on failure)
        workflow_log.push("[1/4] Classifying query...".to_string());
        let output = self
            .invoker
            .call(
                tool_names::CLASSIFY_QUERY,
                ClassifyParams { query }.into_arguments(),
            )
            .await;

        let payload = match &output {
            ToolOutput::Data(value) => decode::<ClassificationPayload>(value)
                .ok_or_else(|| "unexpected classification payload".to_string()),
            ToolOutput::Text(text) => Err(format!("unexpected classification payload: {text}")),
            ToolOutput::Error(message) => Err(message.clone()),
        };
        let ClassificationPayload {
            category,
            confidence,
        } = match payload {
            Ok(p) => p,
            Err(message) => {
                warn!(error = %message, "classification failed");
                return AgentResult::Classification(ClassificationResult {
                    base: ResponseFragment::new(
                        CLASSIFICATION_ERROR_RESPONSE,
                        ActionNeeded::None,
                        self.config.confidences.error,
                    ),
                    classification: None,
                    sources: Vec::new(),
                    workflow_log,
                    llm_prompt: None,
                    error: Some(format!("Classification failed: {message}")),
                });
            }
        };
        let confidence = clamp_confidence(confidence);
        workflow_log.push(format!(
            "[Result] Category: {category} (confidence: {confidence:.2})"
        ));

        // Step 2: Template lookup (degrades to the default prompt)
        workflow_log.push("[2/4] Getting template...".to_string());
        let template = match self
            .invoker
            .call(
                tool_names::GET_QUERY_TEMPLATE,
                TemplateParams {
                    query_name: &category,
                }
                .into_arguments(),
            )
            .await
        {
            ToolOutput::Data(value) => decode::<TemplatePayload>(&value).unwrap_or_default(),
            other => {
                debug!(output = %other, "no usable template, using default prompt");
                TemplatePayload::default()
            }
        };
        let description = template
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| category.clone());

        // Step 3: Knowledge retrieval (degrades to a placeholder)
        workflow_log.push(format!("[3/4] Retrieving knowledge for {category}..."));
        let (knowledge, sources) = match self
            .invoker
            .call(
                tool_names::GET_KNOWLEDGE_FOR_QUERY,
                KnowledgeParams {
                    category: Some(&category),
                    query,
                    max_results: self.config.knowledge_max_results,
                }
                .into_arguments(),
            )
            .await
        {
            ToolOutput::Data(value) => knowledge_from_value(&value),
            ToolOutput::Text(text) if !text.trim().is_empty() => (text, Vec::new()),
            other => {
                debug!(output = %other, "knowledge retrieval returned nothing usable");
                (NO_DOCUMENTATION.to_string(), Vec::new())
            }
        };
        workflow_log.push(format!("[INFO] Retrieved {} source(s)", sources.len()));

        let customer = self.customer_context(query).await;
        if customer.is_some() {
            workflow_log.push("[INFO] Added customer records".to_string());
        }

        // Step 4: Generate and parse
        workflow_log.push("[4/4] Generating response...".to_string());
        let history = self.history_section();
        let prompt = self.prompts.build_support_prompt(
            &template.template,
            query,
            &format!("{knowledge}{}", customer.unwrap_or_default()),
            history.as_deref(),
        );
        let raw = self.generation.generate(&prompt).await;
        let mut base = self.parser.parse(&raw);

        if base.response == KNOWLEDGE_BASE_ONLY {
            base.response = format!(
                "Based on our {description}:\n\n{}...",
                truncate_chars(&knowledge, self.config.knowledge_excerpt_chars)
            );
            base.confidence = self.config.confidences.knowledge_only;
        }
        workflow_log.push("[SUCCESS] Response generated".to_string());

        AgentResult::Classification(ClassificationResult {
            base,
            classification: Some(Classification {
                category,
                confidence,
                description,
            }),
            sources,
            workflow_log,
            llm_prompt: Some(prompt),
            error: None,
        })
    }

    async fn run_direct_rag(&self, query: &str) -> AgentResult {
        // Step 1: Search
        let matches = self
            .search_knowledge(query, self.config.search_max_results)
            .await;

        if matches.is_empty() {
            info!("no knowledge matches, skipping generation");
            return AgentResult::DirectRag(DirectRagResult {
                base: ResponseFragment::new(
                    NO_MATCHES_RESPONSE,
                    ActionNeeded::None,
                    self.config.confidences.no_match,
                ),
                sources: Vec::new(),
                llm_prompt: None,
                error: None,
            });
        }

        // Step 2: Build context, generate and parse
        let top = &matches[..matches.len().min(self.config.context_top_k.max(1))];
        let knowledge = top
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(MATCH_SEPARATOR);
        let sources = dedup_sources(top.iter().map(|m| m.source.clone()));

        let customer = self.customer_context(query).await.unwrap_or_default();

        let history = self.history_section();
        let prompt = self.prompts.build_direct_rag_prompt(
            query,
            &format!("{knowledge}{customer}"),
            history.as_deref(),
        );
        let raw = self.generation.generate(&prompt).await;
        let mut base = self.parser.parse(&raw);

        if base.response == KNOWLEDGE_BASE_ONLY {
            base.response = format!(
                "Here's what I found:\n\n{}...",
                truncate_chars(&knowledge, self.config.knowledge_excerpt_chars)
            );
        }

        AgentResult::DirectRag(DirectRagResult {
            base,
            sources,
            llm_prompt: Some(prompt),
            error: None,
        })
    }

    /// Looks up the customer records `query` mentions.
    ///
    /// Failed or empty lookups are skipped; `None` when nothing was found.
    async fn customer_context(&self, query: &str) -> Option<String> {
        if !self.config.customer_context {
            return None;
        }

        let mut emails = None;
        let mut orders = None;
        for lookup in detect_lookups(query) {
            let tool = lookup.kind.tool_name();
            let text = match self
                .invoker
                .call(tool, LookupParams { query: &lookup.term }.into_arguments())
                .await
            {
                ToolOutput::Text(text) | ToolOutput::Data(Value::String(text)) => text,
                ToolOutput::Data(value) => value.to_string(),
                ToolOutput::Error(message) => {
                    debug!(tool, error = %message, "customer lookup failed, skipping");
                    continue;
                }
            };
            match lookup.kind {
                LookupKind::Emails => emails = Some(text),
                LookupKind::Orders => orders = Some(text),
            }
        }
        PromptSet::customer_context_section(emails.as_deref(), orders.as_deref())
    }

    /// Searches the whole knowledge base without generation.
    ///
    /// Failures and malformed payloads yield no matches.
    pub async fn search_knowledge(&self, query: &str, max_results: usize) -> Vec<KnowledgeMatch> {
        let output = self
            .invoker
            .call(
                tool_names::SEARCH_KNOWLEDGE,
                SearchParams { query, max_results }.into_arguments(),
            )
            .await;

        match output {
            ToolOutput::Data(value) => decode::<SearchPayload>(&value)
                .map(|p| p.matches)
                .unwrap_or_default(),
            other => {
                debug!(output = %other, "search returned nothing usable");
                Vec::new()
            }
        }
    }

    /// Tools discovered on connect.
    #[must_use]
    pub fn available_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Snapshot of the tool call log, oldest first.
    #[must_use]
    pub fn call_log(&self) -> Vec<ToolCallRecord> {
        self.invoker.call_log()
    }

    /// Retained conversation turns, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ConversationTurn> {
        let history = lock(&self.history);
        history.recent(history.capacity())
    }

    /// Forgets all conversation turns.
    pub fn clear_history(&self) {
        lock(&self.history).clear();
        info!("conversation history cleared");
    }

    /// Session outcome counters.
    #[must_use]
    pub fn metrics(&self) -> SessionMetrics {
        *lock(&self.metrics)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Whether generation is available (otherwise knowledge-only mode).
    #[must_use]
    pub fn has_generation(&self) -> bool {
        self.generation.has_backend()
    }

    /// Closes the tool server connection.
    ///
    /// # Errors
    ///
    /// Propagates transport close failures.
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        self.invoker.shutdown().await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("invoker", &self.invoker)
            .field("generation", &self.generation)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reads knowledge text and sources from a retrieval payload.
///
/// Prefers pre-joined `knowledge`; otherwise joins `matches`.
fn knowledge_from_value(value: &Value) -> (String, Vec<String>) {
    let payload = decode::<KnowledgePayload>(value).unwrap_or_default();

    let knowledge = payload
        .knowledge
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            let joined = payload
                .matches
                .iter()
                .map(|m| m.content.as_str())
                .filter(|c| !c.trim().is_empty())
                .collect::<Vec<_>>()
                .join(MATCH_SEPARATOR);
            (!joined.is_empty()).then_some(joined)
        })
        .unwrap_or_else(|| NO_DOCUMENTATION.to_string());

    let sources = dedup_sources(
        payload
            .sources
            .into_iter()
            .chain(payload.matches.into_iter().map(|m| m.source)),
    );

    (knowledge, sources)
}
