//! MCP client transport over a spawned stdio server.
//!
//! The knowledge server runs as a child process speaking MCP on
//! stdin/stdout. Protocol results are converted to JSON and unpacked by
//! small pure functions so the unpacking is testable without a server.

use async_trait::async_trait;
use rmcp::ServiceExt;
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use serde_json::{Map, Value, json};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::agent::tool::{ToolDescriptor, ToolEnvelope, ToolTransport};
use crate::error::AgentError;

/// [`ToolTransport`] backed by an MCP server child process.
pub struct McpToolTransport {
    label: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl McpToolTransport {
    /// Spawns `command args...` and performs the MCP handshake.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connection`] if the process cannot be started
    /// or the handshake fails.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, AgentError> {
        let label = std::iter::once(command)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        info!(server = %label, "starting MCP server");

        let transport = TokioChildProcess::new(Command::new(command).configure(|cmd| {
            cmd.args(args);
        }))
        .map_err(|e| AgentError::Connection {
            message: format!("failed to spawn '{label}': {e}"),
        })?;

        let service = ().serve(transport).await.map_err(|e| AgentError::Connection {
            message: format!("MCP handshake with '{label}' failed: {e}"),
        })?;

        if let Some(info) = service.peer_info() {
            debug!(server = ?info.server_info.name, "MCP session initialized");
        }

        Ok(Self {
            label,
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        })
    }
}

impl std::fmt::Debug for McpToolTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolTransport")
            .field("server", &self.label)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolTransport for McpToolTransport {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| AgentError::ToolCall {
                name: "tools/list".to_string(),
                message: e.to_string(),
            })?;

        Ok(tools
            .iter()
            .filter_map(|t| serde_json::to_value(t).ok())
            .filter_map(|v| descriptor_from_value(&v))
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolEnvelope, AgentError> {
        let tool_error = |message: String| AgentError::ToolCall {
            name: name.to_string(),
            message,
        };

        let params = serde_json::from_value(json!({
            "name": name,
            "arguments": arguments,
        }))
        .map_err(|e| tool_error(format!("invalid call parameters: {e}")))?;

        let result = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| tool_error(e.to_string()))?;

        let value = serde_json::to_value(&result)
            .map_err(|e| tool_error(format!("unreadable result: {e}")))?;
        Ok(envelope_from_value(&value))
    }

    async fn close(&self) -> Result<(), AgentError> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        info!(server = %self.label, "stopping MCP server");
        service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|e| AgentError::Connection {
                message: format!("MCP shutdown failed: {e}"),
            })
    }
}

/// Extracts text items and the `isError` tag from a serialized `CallToolResult`.
pub(crate) fn envelope_from_value(value: &Value) -> ToolEnvelope {
    let texts = value
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let is_error = value
        .get("isError")
        .or_else(|| value.get("is_error"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    ToolEnvelope { texts, is_error }
}

/// Reads a tool descriptor from a serialized MCP `Tool`.
pub(crate) fn descriptor_from_value(value: &Value) -> Option<ToolDescriptor> {
    let name = value.get("name").and_then(Value::as_str)?;
    Some(ToolDescriptor {
        name: name.to_string(),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
