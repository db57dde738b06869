//! Error types for the support agent.
//!
//! Library code returns [`AgentError`]; the CLI wraps it in [`Error`]
//! together with [`CommandError`] for command-level failures.
//!
//! Note that [`Orchestrator::process`](crate::agent::Orchestrator::process)
//! never returns an error: every pipeline failure is folded into an
//! [`AgentResult`](crate::agent::AgentResult). These types cover
//! construction, configuration, and the collaborator boundaries.

use std::time::Duration;

use thiserror::Error;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Agent pipeline or collaborator error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// CLI command error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised at the boundaries of the orchestration engine.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The tool server could not be started or the MCP handshake failed.
    #[error("failed to connect to tool server: {message}")]
    Connection {
        /// Underlying transport message.
        message: String,
    },

    /// A single tool call failed at the transport or protocol level.
    #[error("tool call '{name}' failed: {message}")]
    ToolCall {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// The generation backend rejected or failed a request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error text reported by the backend client.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// An operation exceeded its configured deadline.
    #[error("{operation} timed out after {:.1}s", after.as_secs_f64())]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// The configured limit.
        after: Duration,
    },

    /// Unknown generation provider name.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
    },

    /// Configuration value out of range or malformed.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid value.
        message: String,
    },

    /// The per-instance async runtime could not be created.
    #[error("runtime error: {message}")]
    Runtime {
        /// Underlying error text.
        message: String,
    },
}

/// Errors raised by CLI command handlers.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = AgentError::Timeout {
            operation: "tool call 'classify_query'".to_string(),
            after: Duration::from_millis(2500),
        };
        assert_eq!(
            err.to_string(),
            "tool call 'classify_query' timed out after 2.5s"
        );
    }

    #[test]
    fn test_agent_error_converts_into_crate_error() {
        let err: Error = AgentError::Connection {
            message: "spawn failed".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Agent(AgentError::Connection { .. })));
        assert_eq!(
            err.to_string(),
            "failed to connect to tool server: spawn failed"
        );
    }
}
