//! Prompt templates and builders for the two workflows.
//!
//! Prompt bodies are loaded from external template files when available,
//! falling back to compiled-in defaults. Builders assemble the final text
//! sent to the generation backend: body, optional conversation history,
//! then the JSON output instruction block.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(query|knowledge)\}").unwrap_or_else(|_| unreachable!()));

/// Default body for support queries when the tool server has no template.
pub const SUPPORT_PROMPT: &str = "Please help with this customer question: {query}

Based on this documentation:
{knowledge}

Provide a helpful response.";

/// Default body for exploratory queries answered from search matches.
pub const DIRECT_RAG_PROMPT: &str = "Based on this documentation:
{knowledge}

Answer this question: {query}";

/// Output instructions appended to support prompts.
pub const SUPPORT_FORMAT: &str = r#"Respond with JSON containing:
- "response": your answer (2-3 sentences)
- "action_needed": "none", "create_ticket", or "escalate"
- "confidence": 0-1

JSON Response:"#;

/// Output instructions appended to direct-RAG prompts.
pub const DIRECT_RAG_FORMAT: &str = r#"Respond with JSON containing:
- "response": your answer (2-3 sentences)
- "action_needed": "none"
- "confidence": 0-1

JSON Response:"#;

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/omnitech-agent/prompts";

const SUPPORT_FILENAME: &str = "support.md";
const DIRECT_RAG_FILENAME: &str = "direct_rag.md";
const SUPPORT_FORMAT_FILENAME: &str = "support_format.md";
const DIRECT_RAG_FORMAT_FILENAME: &str = "direct_rag_format.md";

/// Prompt texts used by the orchestrator.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Support body used when no tool-provided template exists.
    pub support: String,
    /// Direct-RAG body.
    pub direct_rag: String,
    /// JSON instructions for the classification workflow.
    pub support_format: String,
    /// JSON instructions for the direct-RAG workflow.
    pub direct_rag_format: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` or config)
    /// 2. `OMNITECH_PROMPT_DIR` environment variable
    /// 3. `~/.config/omnitech-agent/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("OMNITECH_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .map(|s| s.trim_end().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            support: load_file(SUPPORT_FILENAME, SUPPORT_PROMPT),
            direct_rag: load_file(DIRECT_RAG_FILENAME, DIRECT_RAG_PROMPT),
            support_format: load_file(SUPPORT_FORMAT_FILENAME, SUPPORT_FORMAT),
            direct_rag_format: load_file(DIRECT_RAG_FORMAT_FILENAME, DIRECT_RAG_FORMAT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            support: SUPPORT_PROMPT.to_string(),
            direct_rag: DIRECT_RAG_PROMPT.to_string(),
            support_format: SUPPORT_FORMAT.to_string(),
            direct_rag_format: DIRECT_RAG_FORMAT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (SUPPORT_FILENAME, SUPPORT_PROMPT),
            (DIRECT_RAG_FILENAME, DIRECT_RAG_PROMPT),
            (SUPPORT_FORMAT_FILENAME, SUPPORT_FORMAT),
            (DIRECT_RAG_FORMAT_FILENAME, DIRECT_RAG_FORMAT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Builds the classification workflow prompt.
    ///
    /// A non-empty `template` from the tool server replaces the default body.
    #[must_use]
    pub fn build_support_prompt(
        &self,
        template: &str,
        query: &str,
        knowledge: &str,
        history: Option<&str>,
    ) -> String {
        let body = if template.trim().is_empty() {
            &self.support
        } else {
            template
        };
        assemble(
            &fill_template(body, query, knowledge),
            history,
            &self.support_format,
        )
    }

    /// Builds the direct-RAG workflow prompt.
    #[must_use]
    pub fn build_direct_rag_prompt(
        &self,
        query: &str,
        knowledge: &str,
        history: Option<&str>,
    ) -> String {
        assemble(
            &fill_template(&self.direct_rag, query, knowledge),
            history,
            &self.direct_rag_format,
        )
    }

    /// Renders looked-up customer records for appending to knowledge text.
    ///
    /// Returns `None` when neither lookup produced anything.
    #[must_use]
    pub fn customer_context_section(emails: Option<&str>, orders: Option<&str>) -> Option<String> {
        let mut section = String::new();
        if let Some(emails) = emails.map(str::trim).filter(|e| !e.is_empty()) {
            section.push_str(&format!("\n\nCustomer Email History:\n{emails}\n"));
        }
        if let Some(orders) = orders.map(str::trim).filter(|o| !o.is_empty()) {
            section.push_str(&format!("\n\nOrder Information:\n{orders}\n"));
        }
        (!section.is_empty()).then_some(section)
    }
}

/// Substitutes `{query}` and `{knowledge}` in a template.
///
/// Other brace groups are left as-is; tool-provided templates are not
/// trusted to be well-formed.
#[must_use]
pub fn fill_template(template: &str, query: &str, knowledge: &str) -> String {
    // Single pass: placeholders inside substituted text are not expanded.
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
            "query" => query.to_string(),
            _ => knowledge.to_string(),
        })
        .into_owned()
}

fn assemble(body: &str, history: Option<&str>, format: &str) -> String {
    match history {
        Some(h) if !h.is_empty() => {
            format!("{body}\n\nPrevious Conversation:\n{h}\n\n{format}")
        }
        _ => format!("{body}\n\n{format}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template() {
        let out = fill_template("Q: {query}\nK: {knowledge}\n{unknown}", "reset", "docs");
        assert_eq!(out, "Q: reset\nK: docs\n{unknown}");
    }

    #[test]
    fn test_fill_template_does_not_expand_substituted_text() {
        let out = fill_template("{query} | {knowledge}", "what is {knowledge}?", "see {query}");
        assert_eq!(out, "what is {knowledge}? | see {query}");
    }

    #[test]
    fn test_support_prompt_uses_default_body_without_template() {
        let prompts = PromptSet::defaults();
        let prompt = prompts.build_support_prompt("", "How do I reset?", "Step 1", None);
        assert!(prompt.starts_with("Please help with this customer question: How do I reset?"));
        assert!(prompt.contains("Based on this documentation:\nStep 1"));
        assert!(prompt.contains(r#""action_needed": "none", "create_ticket", or "escalate""#));
        assert!(prompt.ends_with("JSON Response:"));
        assert!(!prompt.contains("Previous Conversation:"));
    }

    #[test]
    fn test_support_prompt_prefers_tool_template() {
        let prompts = PromptSet::defaults();
        let prompt = prompts.build_support_prompt(
            "Security issue: {query}\nDocs: {knowledge}",
            "hacked",
            "lock it",
            None,
        );
        assert!(prompt.starts_with("Security issue: hacked\nDocs: lock it\n\nRespond with JSON"));
    }

    #[test]
    fn test_history_section_inserted_before_format() {
        let prompts = PromptSet::defaults();
        let prompt = prompts.build_direct_rag_prompt(
            "What is OmniTech?",
            "A company.",
            Some("Customer: hi\nAgent: hello"),
        );
        let history_at = prompt.find("Previous Conversation:\nCustomer: hi\nAgent: hello");
        let format_at = prompt.find("Respond with JSON");
        assert!(history_at.is_some());
        assert!(history_at < format_at);
        assert!(prompt.contains("Answer this question: What is OmniTech?"));
        assert!(prompt.contains(r#"- "action_needed": "none"
"#));
    }

    #[test]
    fn test_customer_context_section() {
        assert_eq!(PromptSet::customer_context_section(None, Some("  ")), None);
        assert_eq!(
            PromptSet::customer_context_section(None, Some("Found 1 order(s): ORD-1001 shipped")),
            Some("\n\nOrder Information:\nFound 1 order(s): ORD-1001 shipped\n".to_string())
        );
        let both = PromptSet::customer_context_section(Some("Re: refund"), Some("ORD-7"))
            .unwrap_or_default();
        let emails_at = both.find("Customer Email History:\nRe: refund");
        let orders_at = both.find("Order Information:\nORD-7");
        assert!(emails_at.is_some());
        assert!(emails_at < orders_at);
    }

    #[test]
    fn test_load_prefers_files_per_template() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("support.md"), "Custom {query}\n")
            .unwrap_or_else(|_| unreachable!());

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.support, "Custom {query}");
        assert_eq!(prompts.direct_rag, DIRECT_RAG_PROMPT);
        assert_eq!(prompts.support_format, SUPPORT_FORMAT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("direct_rag.md"), "mine")
            .unwrap_or_else(|_| unreachable!());

        let written = PromptSet::write_defaults(dir.path()).unwrap_or_else(|_| unreachable!());
        assert_eq!(written.len(), 3);

        let kept = std::fs::read_to_string(dir.path().join("direct_rag.md"))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(kept, "mine");

        let loaded = PromptSet::load(Some(dir.path()));
        assert_eq!(loaded.support, SUPPORT_PROMPT);
    }
}
