//! Recovery of structured answers from free-form model output.
//!
//! Small instruction-tuned models rarely emit clean JSON. [`ResponseParser`]
//! tries, in order:
//!
//! 1. the whole text as a JSON object,
//! 2. the contents of a fenced code block (```` ```json ```` or bare ```` ``` ````),
//! 3. the first flat `{...}` containing a `"response"` key,
//! 4. the fence-stripped text itself, truncated.
//!
//! The last stage cannot fail, so parsing always yields a [`ResponseFragment`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::result::{ActionNeeded, ResponseFragment, clamp_confidence};

static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap_or_else(|_| unreachable!())
});

static EMBEDDED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^{}]*"response"[^{}]*\}"#).unwrap_or_else(|_| unreachable!())
});

static FENCE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?").unwrap_or_else(|_| unreachable!()));

/// Text used when a parsed object has no usable `response` field.
pub const MISSING_RESPONSE: &str = "I'm sorry, I couldn't generate a proper response.";

/// Which stage of the fallback chain produced a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The entire text was a JSON object.
    WholeText,
    /// A fenced code block held the object.
    FencedBlock,
    /// A flat object containing `"response"` was found inside prose.
    EmbeddedObject,
    /// No object found; raw text was wrapped.
    Fallback,
}

/// Turns raw generated text into a [`ResponseFragment`].
#[derive(Debug, Clone)]
pub struct ResponseParser {
    max_chars: usize,
    fallback_confidence: f64,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(500, 0.6)
    }
}

impl ResponseParser {
    /// Creates a parser truncating fallback text to `max_chars` characters.
    #[must_use]
    pub fn new(max_chars: usize, fallback_confidence: f64) -> Self {
        Self {
            max_chars: max_chars.max(1),
            fallback_confidence: clamp_confidence(fallback_confidence),
        }
    }

    /// Parses `raw`, never failing.
    #[must_use]
    pub fn parse(&self, raw: &str) -> ResponseFragment {
        self.parse_with_strategy(raw).0
    }

    /// Parses `raw` and reports which stage succeeded.
    #[must_use]
    pub fn parse_with_strategy(&self, raw: &str) -> (ResponseFragment, ParseStrategy) {
        let (fragment, strategy) = if let Some(obj) = parse_object(raw.trim()) {
            (self.complete(&obj), ParseStrategy::WholeText)
        } else if let Some(obj) = FENCED_RE
            .captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_object(m.as_str()))
        {
            (self.complete(&obj), ParseStrategy::FencedBlock)
        } else if let Some(obj) = EMBEDDED_RE
            .find(raw)
            .and_then(|m| parse_object(m.as_str()))
        {
            (self.complete(&obj), ParseStrategy::EmbeddedObject)
        } else {
            (self.wrap_text(raw), ParseStrategy::Fallback)
        };

        debug!(
            strategy = ?strategy,
            raw_chars = raw.chars().count(),
            confidence = fragment.confidence,
            "parsed generation output"
        );
        (fragment, strategy)
    }

    fn wrap_text(&self, raw: &str) -> ResponseFragment {
        let cleaned = FENCE_MARKER_RE.replace_all(raw, "");
        let text = truncate_chars(cleaned.trim(), self.max_chars);
        ResponseFragment::new(text, ActionNeeded::None, self.fallback_confidence)
    }

    /// Fills in missing or malformed mandatory fields.
    fn complete(&self, obj: &Map<String, Value>) -> ResponseFragment {
        let response = match obj.get("response") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => MISSING_RESPONSE.to_string(),
            Some(other) => other.to_string(),
        };

        let action_needed = obj
            .get("action_needed")
            .and_then(Value::as_str)
            .map(ActionNeeded::parse_lenient)
            .unwrap_or_default();

        let confidence = obj
            .get("confidence")
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|c| c.is_finite())
            .unwrap_or(self.fallback_confidence);

        ResponseFragment::new(response, action_needed, confidence)
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Truncates to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
