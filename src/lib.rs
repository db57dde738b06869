//! # omnitech-agent
//!
//! Customer support query orchestration over an MCP knowledge server and
//! an OpenAI-compatible generation backend.
//!
//! Each query is routed to one of two workflows:
//!
//! - **classification**: classify the query, look up a category template,
//!   retrieve category knowledge, then generate;
//! - **direct RAG**: search the whole knowledge base, then generate.
//!
//! Whatever the model returns, the caller receives a well-formed
//! [`AgentResult`] with a response, a recommended follow-up action and a
//! confidence. Tool, generation and parse failures degrade to fixed
//! fallbacks instead of surfacing as errors.
//!
//! ```no_run
//! use omnitech_agent::{AgentConfig, SyncAgent};
//!
//! # fn main() -> Result<(), omnitech_agent::AgentError> {
//! let agent = SyncAgent::connect(AgentConfig::from_env()?)?;
//! let result = agent.process_query("How do I reset my password?");
//! assert!(!result.response().is_empty());
//! agent.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod mcp;
pub mod telemetry;

pub use agent::{
    ActionNeeded, AgentConfig, AgentResult, Orchestrator, QueryRouter, ResponseParser, SyncAgent,
    Workflow,
};
pub use error::{AgentError, CommandError, Error, Result};
