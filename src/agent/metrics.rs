//! Per-session outcome counters.

use serde::Serialize;

use super::result::{ActionNeeded, AgentResult};

/// Counts of answered queries by recommended follow-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionMetrics {
    /// Queries processed.
    pub total_queries: u64,
    /// Error-free answers with no follow-up and confidence above the
    /// resolution threshold.
    pub resolved: u64,
    /// Queries where a ticket was suggested.
    pub tickets_suggested: u64,
    /// Queries escalated to a human.
    pub escalations: u64,
}

impl SessionMetrics {
    /// Counts one result.
    ///
    /// Fallback answers (classification failure, apology, warm-up, no
    /// matches) carry `ActionNeeded::None` with low confidence; they are
    /// not resolved.
    pub fn record(&mut self, result: &AgentResult, resolved_above: f64) {
        self.total_queries += 1;
        match result.action_needed() {
            ActionNeeded::None => {
                if result.error().is_none() && result.confidence() > resolved_above {
                    self.resolved += 1;
                }
            }
            ActionNeeded::CreateTicket => self.tickets_suggested += 1,
            ActionNeeded::Escalate => self.escalations += 1,
        }
    }

    /// Share of queries resolved without follow-up, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn resolution_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.resolved as f64 * 100.0 / self.total_queries as f64
        }
    }
}
