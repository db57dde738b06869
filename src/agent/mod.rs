//! Support query orchestration.
//!
//! Routes customer queries to one of two workflows over an MCP knowledge
//! server and an OpenAI-compatible generation backend, and recovers a
//! structured answer from whatever the model produces.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── QueryRouter (keywords, then help-seeking patterns)
//!   ├── ToolInvoker → ToolTransport (MCP) ── 20-entry call log
//!   ├── customer lookups (search_emails / search_orders)
//!   ├── PromptSet + ConversationHistory (last 3 turns)
//!   ├── GenerationClient (sentinel / warm-up / apology fallbacks)
//!   └── ResponseParser (whole text → fenced → embedded → fallback)
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod generation;
pub mod history;
pub mod invoker;
pub mod message;
pub mod metrics;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod result;
pub mod router;
pub mod sync;
pub mod tool;

pub use config::{AgentConfig, Confidences};
pub use context::{CustomerLookup, LookupKind, detect_lookups};
pub use generation::{GenerationClient, KNOWLEDGE_BASE_ONLY};
pub use history::{ConversationHistory, ConversationTurn};
pub use invoker::{CallLog, SuccessPolicy, ToolCallRecord, ToolInvoker};
pub use message::{ChatRequest, ChatResponse, TokenUsage};
pub use metrics::SessionMetrics;
pub use orchestrator::Orchestrator;
pub use parser::{ParseStrategy, ResponseParser};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use result::{
    ActionNeeded, AgentResult, Classification, ClassificationResult, DirectRagResult,
    ResponseFragment, Workflow,
};
pub use router::{QueryRouter, Route, RouteSignal};
pub use sync::SyncAgent;
pub use tool::{ToolDescriptor, ToolEnvelope, ToolOutput, ToolTransport};
