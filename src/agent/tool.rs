//! Tool-calling seam between the orchestrator and the knowledge server.
//!
//! [`ToolTransport`] is the narrow contract the invoker needs: list tools,
//! call a tool, close. The production implementation speaks MCP over a
//! child process ([`crate::mcp::McpToolTransport`]); tests script one in
//! memory.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// A tool advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name used in calls.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Raw protocol response: the text payloads plus the server's error tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnvelope {
    /// Text content items, in order.
    pub texts: Vec<String>,
    /// Whether the server flagged the call as failed.
    pub is_error: bool,
}

impl ToolEnvelope {
    /// A successful single-text envelope.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            texts: vec![text.into()],
            is_error: false,
        }
    }

    /// A successful envelope carrying `value` serialized as JSON.
    #[must_use]
    pub fn json(value: &Value) -> Self {
        Self::text(value.to_string())
    }

    /// A server-flagged failure.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            texts: vec![text.into()],
            is_error: true,
        }
    }
}

/// Transport for request/response tool calls.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Short transport description for logs.
    fn name(&self) -> &str;

    /// Lists the tools the server offers.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError>;

    /// Calls `name` with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolCall`] on transport or protocol failure.
    /// A tool that ran and reported failure is `Ok` with `is_error` set.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolEnvelope, AgentError>;

    /// Releases the connection. Calling it twice is harmless.
    async fn close(&self) -> Result<(), AgentError>;
}

/// Unwrapped result of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// First payload decoded as JSON.
    Data(Value),
    /// First payload was not JSON.
    Text(String),
    /// The call failed; carries the message.
    Error(String),
}

impl ToolOutput {
    /// Unwraps a protocol envelope.
    ///
    /// The first text payload is JSON-decoded when possible. A server error
    /// tag, or a decoded object with a top-level `error` key, yields
    /// [`ToolOutput::Error`].
    #[must_use]
    pub fn from_envelope(envelope: ToolEnvelope) -> Self {
        let ToolEnvelope { texts, is_error } = envelope;
        let first = texts.into_iter().next().unwrap_or_default();

        if is_error {
            let message = if first.trim().is_empty() {
                "tool reported an error".to_string()
            } else {
                first
            };
            return Self::Error(message);
        }

        match serde_json::from_str::<Value>(&first) {
            Ok(Value::Object(map)) if map.contains_key("error") => {
                let message = match map.get("error") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Self::Error(message)
            }
            Ok(value) => Self::Data(value),
            Err(_) => Self::Text(first),
        }
    }

    /// Whether the call failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The error message, for failed calls.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(m) => Some(m),
            _ => None,
        }
    }

    /// The decoded JSON value, for structured results.
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Data(v) => Some(v),
            _ => None,
        }
    }

    /// The raw text, for unstructured results.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// JSON view of the output; failures become `{"error": message}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Data(v) => v.clone(),
            Self::Text(t) => Value::String(t.clone()),
            Self::Error(m) => serde_json::json!({ "error": m }),
        }
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(v) => write!(f, "{v}"),
            Self::Text(t) => f.write_str(t),
            Self::Error(m) => write!(f, "error: {m}"),
        }
    }
}
