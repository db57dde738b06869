//! Blocking facade over the async orchestrator.
//!
//! Each [`SyncAgent`] owns a current-thread tokio runtime. Independent
//! agents may live on different threads; callers sharing one agent are
//! serialized by an entry mutex so `block_on` is never re-entered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::invoker::ToolCallRecord;
use super::metrics::SessionMetrics;
use super::orchestrator::Orchestrator;
use super::result::AgentResult;
use super::tool::ToolDescriptor;
use crate::error::AgentError;
use crate::mcp::KnowledgeMatch;

/// Synchronous support agent.
pub struct SyncAgent {
    runtime: Runtime,
    orchestrator: Orchestrator,
    entry: Mutex<()>,
    closed: AtomicBool,
}

fn build_runtime() -> Result<Runtime, AgentError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AgentError::Runtime {
            message: format!("failed to start async runtime: {e}"),
        })
}

impl SyncAgent {
    /// Starts a runtime, spawns the tool server and connects.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Runtime`] if the runtime cannot start and
    /// propagates [`Orchestrator::connect`] failures.
    pub fn connect(config: AgentConfig) -> Result<Self, AgentError> {
        let runtime = build_runtime()?;
        let orchestrator = runtime.block_on(Orchestrator::connect(config))?;
        Ok(Self::assemble(runtime, orchestrator))
    }

    /// Wraps an already constructed orchestrator in a fresh runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Runtime`] if the runtime cannot start.
    pub fn from_orchestrator(orchestrator: Orchestrator) -> Result<Self, AgentError> {
        Ok(Self::assemble(build_runtime()?, orchestrator))
    }

    const fn assemble(runtime: Runtime, orchestrator: Orchestrator) -> Self {
        Self {
            runtime,
            orchestrator,
            entry: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    fn enter<F: std::future::Future>(&self, future: F) -> F::Output {
        let _entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        self.runtime.block_on(future)
    }

    /// Processes one query. Never fails.
    pub fn process_query(&self, query: &str) -> AgentResult {
        self.enter(self.orchestrator.process(query))
    }

    /// Searches the knowledge base without generation.
    pub fn search_knowledge(&self, query: &str, max_results: usize) -> Vec<KnowledgeMatch> {
        self.enter(self.orchestrator.search_knowledge(query, max_results))
    }

    /// Tools discovered on connect.
    #[must_use]
    pub fn available_tools(&self) -> &[ToolDescriptor] {
        self.orchestrator.available_tools()
    }

    /// Snapshot of the tool call log.
    #[must_use]
    pub fn call_log(&self) -> Vec<ToolCallRecord> {
        self.orchestrator.call_log()
    }

    /// Forgets all conversation turns.
    pub fn clear_history(&self) {
        self.orchestrator.clear_history();
    }

    /// Session outcome counters.
    #[must_use]
    pub fn metrics(&self) -> SessionMetrics {
        self.orchestrator.metrics()
    }

    /// The wrapped orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Disconnects from the tool server. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Propagates the first close failure.
    pub fn shutdown(&self) -> Result<(), AgentError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.enter(self.orchestrator.shutdown())
    }
}

impl Drop for SyncAgent {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        // block_on panics inside another runtime; leave cleanup to process exit.
        if Handle::try_current().is_ok() {
            debug!("dropped inside a runtime, skipping tool server shutdown");
            return;
        }
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "tool server shutdown failed");
        }
    }
}

impl std::fmt::Debug for SyncAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncAgent")
            .field("orchestrator", &self.orchestrator)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
