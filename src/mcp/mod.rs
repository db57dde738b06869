//! MCP (Model Context Protocol) client for the knowledge server.
//!
//! The orchestrator reaches classification, templates and retrieval
//! through four tools served by an external process:
//!
//! ```text
//! Orchestrator
//!   ↓ ToolInvoker::call(name, arguments)
//! McpToolTransport ── stdio ──▶ knowledge server (child process)
//!   ├── classify_query
//!   ├── get_query_template
//!   ├── get_knowledge_for_query
//!   └── search_knowledge
//! ```

pub mod client;
pub mod params;

pub use client::McpToolTransport;
pub use params::{
    ClassificationPayload, KnowledgeMatch, KnowledgePayload, SearchPayload, TemplatePayload,
    tool_names,
};
