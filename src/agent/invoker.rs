//! Instrumented tool invocation with a bounded call log.
//!
//! [`ToolInvoker::call`] never fails: transport errors and timeouts become
//! [`ToolOutput::Error`] so each workflow step can apply its own fallback.
//! Every call, successful or not, is timed and recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::tool::{ToolDescriptor, ToolOutput, ToolTransport};
use crate::error::AgentError;

/// How a call's `success` flag is decided for the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// Trust the protocol error tag and a top-level `error` key.
    #[default]
    EnvelopeTag,
    /// Fail any call whose stringified result mentions "error".
    ///
    /// Misreports legitimate content such as troubleshooting articles
    /// about error codes.
    SubstringHeuristic,
}

impl SuccessPolicy {
    fn judge(self, output: &ToolOutput) -> bool {
        match self {
            Self::EnvelopeTag => !output.is_error(),
            Self::SubstringHeuristic => {
                !output.to_value().to_string().to_lowercase().contains("error")
            }
        }
    }
}

/// One entry of the call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// When the call finished.
    pub timestamp: DateTime<Utc>,
    /// Tool name.
    pub tool: String,
    /// Arguments as sent.
    pub arguments: Value,
    /// Wall-clock duration, rounded to hundredths of a millisecond.
    pub duration_ms: f64,
    /// Outcome under the configured [`SuccessPolicy`].
    pub success: bool,
}

/// FIFO ring buffer of call records.
#[derive(Debug, Clone)]
pub struct CallLog {
    records: VecDeque<ToolCallRecord>,
    capacity: usize,
}

impl CallLog {
    /// Creates an empty log holding at most `capacity` records (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a record, evicting the oldest past capacity.
    pub fn push(&mut self, record: ToolCallRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Snapshot, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ToolCallRecord> {
        self.records.iter().cloned().collect()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

/// Thin instrumented client over a [`ToolTransport`].
pub struct ToolInvoker {
    transport: Arc<dyn ToolTransport>,
    log: Mutex<CallLog>,
    policy: SuccessPolicy,
    timeout: Duration,
}

impl ToolInvoker {
    /// Wraps `transport`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ToolTransport>,
        log_capacity: usize,
        policy: SuccessPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            log: Mutex::new(CallLog::new(log_capacity)),
            policy,
            timeout,
        }
    }

    /// Calls a tool, recording the outcome. Never fails.
    pub async fn call(&self, name: &str, arguments: Map<String, Value>) -> ToolOutput {
        let logged_args = Value::Object(arguments.clone());
        debug!(tool = name, arguments = %logged_args, "calling tool");

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.timeout, self.transport.call_tool(name, arguments)).await;
        let elapsed = started.elapsed();

        let output = match outcome {
            Ok(Ok(envelope)) => ToolOutput::from_envelope(envelope),
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "tool call failed");
                ToolOutput::Error(e.to_string())
            }
            Err(_) => {
                let e = AgentError::Timeout {
                    operation: format!("tool call '{name}'"),
                    after: self.timeout,
                };
                warn!(tool = name, error = %e, "tool call timed out");
                ToolOutput::Error(e.to_string())
            }
        };

        let record = ToolCallRecord {
            timestamp: Utc::now(),
            tool: name.to_string(),
            arguments: logged_args,
            duration_ms: round_ms(elapsed),
            success: self.policy.judge(&output),
        };
        debug!(
            tool = name,
            duration_ms = record.duration_ms,
            success = record.success,
            "tool call finished"
        );
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);

        output
    }

    /// Snapshot of the call log, oldest first.
    #[must_use]
    pub fn call_log(&self) -> Vec<ToolCallRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Lists server tools.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and times out after the call deadline.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        let tools = tokio::time::timeout(self.timeout, self.transport.list_tools())
            .await
            .map_err(|_| AgentError::Timeout {
                operation: "tool listing".to_string(),
                after: self.timeout,
            })??;
        info!(
            transport = self.transport.name(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "discovered tools"
        );
        Ok(tools)
    }

    /// Closes the transport.
    ///
    /// # Errors
    ///
    /// Propagates transport close failures.
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        self.transport.close().await
    }
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("transport", &self.transport.name())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::ToolEnvelope;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;

    /// Echoes a fixed envelope, or fails/hangs on request.
    struct FixedTransport {
        envelope: ToolEnvelope,
        fail: bool,
        hang: bool,
    }

    #[async_trait]
    impl ToolTransport for FixedTransport {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
            Ok(vec![ToolDescriptor {
                name: "search_knowledge".to_string(),
                description: None,
            }])
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: Map<String, Value>,
        ) -> Result<ToolEnvelope, AgentError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(AgentError::ToolCall {
                    name: name.to_string(),
                    message: "broken pipe".to_string(),
                });
            }
            Ok(self.envelope.clone())
        }

        async fn close(&self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    fn invoker(envelope: ToolEnvelope, fail: bool, hang: bool, policy: SuccessPolicy) -> ToolInvoker {
        ToolInvoker::new(
            Arc::new(FixedTransport {
                envelope,
                fail,
                hang,
            }),
            20,
            policy,
            Duration::from_secs(5),
        )
    }

    fn args(query: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("query".to_string(), json!(query));
        map
    }

    #[tokio::test]
    async fn test_success_recorded() {
        let inv = invoker(
            ToolEnvelope::json(&json!({"matches": []})),
            false,
            false,
            SuccessPolicy::EnvelopeTag,
        );
        let out = inv.call("search_knowledge", args("hello")).await;
        assert_eq!(out, ToolOutput::Data(json!({"matches": []})));

        let log = inv.call_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].tool, "search_knowledge");
        assert_eq!(log[0].arguments, json!({"query": "hello"}));
        assert!(log[0].success);
        assert!(log[0].duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_error_payload() {
        let inv = invoker(ToolEnvelope::default(), true, false, SuccessPolicy::EnvelopeTag);
        let out = inv.call("classify_query", args("x")).await;
        assert!(out.error_message().is_some_and(|m| m.contains("broken pipe")));
        assert!(!inv.call_log()[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_payload() {
        let inv = invoker(ToolEnvelope::default(), false, true, SuccessPolicy::EnvelopeTag);
        let out = inv.call("classify_query", args("x")).await;
        assert!(out.error_message().is_some_and(|m| m.contains("timed out")));
        assert_eq!(inv.call_log().len(), 1);
    }

    #[tokio::test]
    async fn test_policies_disagree_on_error_word_in_content() {
        let envelope = ToolEnvelope::json(&json!({"knowledge": "Error E42: battery flat"}));

        let tagged = invoker(envelope.clone(), false, false, SuccessPolicy::EnvelopeTag);
        tagged.call("get_knowledge_for_query", args("e42")).await;
        assert!(tagged.call_log()[0].success);

        let heuristic = invoker(envelope, false, false, SuccessPolicy::SubstringHeuristic);
        heuristic.call("get_knowledge_for_query", args("e42")).await;
        assert!(!heuristic.call_log()[0].success);
    }

    #[tokio::test]
    async fn test_list_tools() {
        let inv = invoker(ToolEnvelope::default(), false, false, SuccessPolicy::EnvelopeTag);
        let tools = inv.list_tools().await.unwrap_or_default();
        assert_eq!(tools.len(), 1);
    }

    #[test]
    fn test_round_ms() {
        assert!((round_ms(Duration::from_micros(12_346)) - 12.35).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_call_log_keeps_most_recent(count in 0usize..60) {
            let mut log = CallLog::new(20);
            for i in 0..count {
                log.push(ToolCallRecord {
                    timestamp: Utc::now(),
                    tool: i.to_string(),
                    arguments: Value::Null,
                    duration_ms: 0.0,
                    success: true,
                });
            }
            prop_assert!(log.len() <= 20);
            let tools: Vec<usize> = log
                .snapshot()
                .iter()
                .filter_map(|r| r.tool.parse().ok())
                .collect();
            let expected: Vec<usize> = (count.saturating_sub(20)..count).collect();
            prop_assert_eq!(tools, expected);
        }
    }
}
