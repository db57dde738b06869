//! Output formatting for CLI results.

#![allow(clippy::format_push_string)]

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::{AgentResult, SessionMetrics, ToolCallRecord, ToolDescriptor};
use crate::mcp::KnowledgeMatch;

const PREVIEW_CHARS: usize = 200;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, defaulting to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON followed by a newline.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let mut out = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("serialization failed: {e}") }).to_string()
        });
        out.push('\n');
        out
    }
}

/// Formats one agent answer.
#[must_use]
pub fn format_result(result: &AgentResult, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(result);
    }

    let mut out = format!("[{}]\n{}\n", result.workflow(), result.response());
    if let Some(c) = result.classification() {
        let _ = writeln!(
            out,
            "\nCategory: {} ({:.2})",
            c.category, c.confidence
        );
    }
    let _ = writeln!(
        out,
        "Action: {} | Confidence: {:.2}",
        result.action_needed(),
        result.confidence()
    );
    if !result.sources().is_empty() {
        let _ = writeln!(out, "Sources: {}", result.sources().join(", "));
    }
    if let Some(err) = result.error() {
        let _ = writeln!(out, "Error: {err}");
    }
    out
}

/// Formats discovered tools.
#[must_use]
pub fn format_tools(tools: &[ToolDescriptor], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(tools);
    }
    if tools.is_empty() {
        return "No tools advertised by the server.\n".to_string();
    }

    let mut out = format!("{} tool(s):\n", tools.len());
    for tool in tools {
        match &tool.description {
            Some(d) => {
                let _ = writeln!(out, "  {:<28} {}", tool.name, first_line(d));
            }
            None => {
                let _ = writeln!(out, "  {}", tool.name);
            }
        }
    }
    out
}

/// Formats knowledge search matches.
#[must_use]
pub fn format_matches(query: &str, matches: &[KnowledgeMatch], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(&serde_json::json!({
            "query": query,
            "count": matches.len(),
            "matches": matches,
        }));
    }
    if matches.is_empty() {
        return format!("No matches for \"{query}\".\n");
    }

    let mut out = format!("{} match(es) for \"{query}\":\n", matches.len());
    for (i, m) in matches.iter().enumerate() {
        let source = if m.source.is_empty() { "unknown" } else { &m.source };
        let _ = writeln!(out, "\n{}. [{source}]", i + 1);
        let _ = writeln!(out, "   {}", preview(&m.content, PREVIEW_CHARS));
    }
    out
}

/// Formats the tool call log, oldest first.
#[must_use]
pub fn format_call_log(records: &[ToolCallRecord], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(records);
    }
    if records.is_empty() {
        return "No tool calls yet.\n".to_string();
    }

    let mut out = String::new();
    for r in records {
        out.push_str(&format!(
            "{} {:<26} {:>9.2}ms {}\n",
            r.timestamp.format("%H:%M:%S"),
            r.tool,
            r.duration_ms,
            if r.success { "ok" } else { "FAILED" }
        ));
    }
    out
}

/// Formats session metrics.
#[must_use]
pub fn format_metrics(metrics: &SessionMetrics, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(&serde_json::json!({
            "total_queries": metrics.total_queries,
            "resolved": metrics.resolved,
            "tickets_suggested": metrics.tickets_suggested,
            "escalations": metrics.escalations,
            "resolution_rate": metrics.resolution_rate(),
        }));
    }
    format!(
        "Queries: {} | Resolved: {} | Tickets: {} | Escalations: {} | Resolution rate: {:.0}%\n",
        metrics.total_queries,
        metrics.resolved,
        metrics.tickets_suggested,
        metrics.escalations,
        metrics.resolution_rate()
    )
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("").trim()
}

fn preview(s: &str, max_chars: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
