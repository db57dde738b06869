//! Structured results produced by the orchestrator.
//!
//! Every path out of [`Orchestrator::process`](super::Orchestrator::process)
//! yields an [`AgentResult`]. The three mandatory fields live in
//! [`ResponseFragment`], flattened into each workflow variant so the
//! serialized form is a single flat record tagged with `workflow`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Follow-up the agent recommends after answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionNeeded {
    /// Answer is self-contained.
    #[default]
    None,
    /// A support ticket should be opened.
    CreateTicket,
    /// A human agent should take over.
    Escalate,
}

impl ActionNeeded {
    /// Parses a model-supplied action; anything unrecognized is [`ActionNeeded::None`].
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "create_ticket" => Self::CreateTicket,
            "escalate" => Self::Escalate,
            _ => Self::None,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CreateTicket => "create_ticket",
            Self::Escalate => "escalate",
        }
    }
}

impl fmt::Display for ActionNeeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which workflow produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// Four-step classify → template → knowledge → generate.
    Classification,
    /// Search → generate.
    DirectRag,
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Classification => "classification",
            Self::DirectRag => "direct_rag",
        })
    }
}

/// The three fields every result carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFragment {
    /// Text shown to the customer.
    pub response: String,
    /// Recommended follow-up.
    pub action_needed: ActionNeeded,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl ResponseFragment {
    /// Creates a fragment, clamping confidence into `[0, 1]`.
    #[must_use]
    pub fn new(response: impl Into<String>, action_needed: ActionNeeded, confidence: f64) -> Self {
        Self {
            response: response.into(),
            action_needed,
            confidence: clamp_confidence(confidence),
        }
    }
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Category assigned by the classification tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Support category, e.g. `account_security`.
    pub category: String,
    /// Classifier confidence.
    pub confidence: f64,
    /// Template description, or the category name when none was found.
    pub description: String,
}

/// Result of the classification workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Mandatory fields.
    #[serde(flatten)]
    pub base: ResponseFragment,
    /// Present once the classify step succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Knowledge source identifiers, deduplicated, first-seen order.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Step-by-step trace.
    #[serde(default)]
    pub workflow_log: Vec<String>,
    /// Exact prompt sent for generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_prompt: Option<String>,
    /// Set when the workflow ended early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the direct-RAG workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRagResult {
    /// Mandatory fields.
    #[serde(flatten)]
    pub base: ResponseFragment,
    /// Knowledge source identifiers, deduplicated, first-seen order.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Exact prompt sent for generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_prompt: Option<String>,
    /// Set when the query could not be processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Canonical orchestrator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "workflow", rename_all = "snake_case")]
pub enum AgentResult {
    /// Support query handled by the classification workflow.
    Classification(ClassificationResult),
    /// Exploratory query handled by direct retrieval.
    DirectRag(DirectRagResult),
}

impl AgentResult {
    /// The mandatory fields.
    #[must_use]
    pub const fn base(&self) -> &ResponseFragment {
        match self {
            Self::Classification(r) => &r.base,
            Self::DirectRag(r) => &r.base,
        }
    }

    /// Customer-facing text.
    #[must_use]
    pub fn response(&self) -> &str {
        &self.base().response
    }

    /// Recommended follow-up.
    #[must_use]
    pub const fn action_needed(&self) -> ActionNeeded {
        self.base().action_needed
    }

    /// Confidence in `[0, 1]`.
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.base().confidence
    }

    /// Workflow tag.
    #[must_use]
    pub const fn workflow(&self) -> Workflow {
        match self {
            Self::Classification(_) => Workflow::Classification,
            Self::DirectRag(_) => Workflow::DirectRag,
        }
    }

    /// Knowledge sources behind the answer.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        match self {
            Self::Classification(r) => &r.sources,
            Self::DirectRag(r) => &r.sources,
        }
    }

    /// Early-exit error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Classification(r) => r.error.as_deref(),
            Self::DirectRag(r) => r.error.as_deref(),
        }
    }

    /// Prompt sent to the generation backend, if generation ran.
    #[must_use]
    pub fn llm_prompt(&self) -> Option<&str> {
        match self {
            Self::Classification(r) => r.llm_prompt.as_deref(),
            Self::DirectRag(r) => r.llm_prompt.as_deref(),
        }
    }

    /// Classification, for results of the classification workflow.
    #[must_use]
    pub const fn classification(&self) -> Option<&Classification> {
        match self {
            Self::Classification(r) => r.classification.as_ref(),
            Self::DirectRag(_) => None,
        }
    }

    /// Step trace; empty for direct-RAG results.
    #[must_use]
    pub fn workflow_log(&self) -> &[String] {
        match self {
            Self::Classification(r) => &r.workflow_log,
            Self::DirectRag(_) => &[],
        }
    }
}

/// Deduplicates source identifiers, keeping first-seen order.
pub(crate) fn dedup_sources<I>(sources: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for source in sources {
        if !source.is_empty() && !out.contains(&source) {
            out.push(source);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("none", ActionNeeded::None ; "none")]
    #[test_case("create_ticket", ActionNeeded::CreateTicket ; "ticket")]
    #[test_case(" Create-Ticket ", ActionNeeded::CreateTicket ; "ticket loose")]
    #[test_case("ESCALATE", ActionNeeded::Escalate ; "escalate upper")]
    #[test_case("call the police", ActionNeeded::None ; "unknown")]
    fn test_parse_action(input: &str, expected: ActionNeeded) {
        assert_eq!(ActionNeeded::parse_lenient(input), expected);
    }

    #[test]
    fn test_serializes_flat_with_workflow_tag() {
        let result = AgentResult::DirectRag(DirectRagResult {
            base: ResponseFragment::new("Here you go.", ActionNeeded::None, 0.9),
            sources: vec!["faq.pdf".to_string()],
            llm_prompt: None,
            error: None,
        });
        let value = serde_json::to_value(&result).unwrap_or_default();
        assert_eq!(
            value,
            json!({
                "workflow": "direct_rag",
                "response": "Here you go.",
                "action_needed": "none",
                "confidence": 0.9,
                "sources": ["faq.pdf"],
            })
        );
    }

    #[test]
    fn test_classification_result_round_trips_through_json() {
        let result = AgentResult::Classification(ClassificationResult {
            base: ResponseFragment::new("Reset it.", ActionNeeded::CreateTicket, 0.75),
            classification: Some(Classification {
                category: "account_security".to_string(),
                confidence: 0.92,
                description: "Account Security".to_string(),
            }),
            sources: vec![],
            workflow_log: vec!["[1/4] Classifying query...".to_string()],
            llm_prompt: Some("prompt".to_string()),
            error: None,
        });
        let text = serde_json::to_string(&result).unwrap_or_default();
        assert!(text.contains(r#""workflow":"classification""#));
        let back: AgentResult = serde_json::from_str(&text).unwrap_or_else(|_| unreachable!());
        assert_eq!(back, result);
        assert_eq!(back.workflow(), Workflow::Classification);
        assert_eq!(back.action_needed(), ActionNeeded::CreateTicket);
    }

    #[test]
    fn test_fragment_clamps_confidence() {
        assert!((ResponseFragment::new("", ActionNeeded::None, 4.0).confidence - 1.0).abs() < f64::EPSILON);
        assert!(ResponseFragment::new("", ActionNeeded::None, -1.0).confidence.abs() < f64::EPSILON);
        assert!(ResponseFragment::new("", ActionNeeded::None, f64::NAN).confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_dedup_sources_keeps_first_seen_order() {
        let sources = ["b.pdf", "a.pdf", "b.pdf", "", "c.pdf", "a.pdf"]
            .into_iter()
            .map(str::to_string);
        assert_eq!(dedup_sources(sources), vec!["b.pdf", "a.pdf", "c.pdf"]);
    }
}
