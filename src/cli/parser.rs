//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// OmniTech support agent.
///
/// Answers customer queries using an MCP knowledge server and an
/// OpenAI-compatible model. Without an API token, answers come straight
/// from the knowledge base.
#[derive(Parser, Debug)]
#[command(name = "omnitech-agent")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command that starts the MCP knowledge server.
    #[arg(long, global = true, env = "OMNITECH_MCP_COMMAND")]
    pub mcp_command: Option<String>,

    /// Argument passed to the MCP server command (repeatable).
    #[arg(long = "mcp-arg", global = true, allow_hyphen_values = true)]
    pub mcp_args: Vec<String>,

    /// Generation model identifier.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Directory containing prompt template files.
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single query and exit.
    #[command(after_help = r#"Examples:
  omnitech-agent ask "How do I reset my password?"
  omnitech-agent --format json ask "Tell me about OmniTech" | jq .workflow
"#)]
    Ask {
        /// Customer query.
        query: String,
    },

    /// Interactive support session.
    ///
    /// Type a question per line. `exit` or `quit` leaves, `clear` forgets
    /// the conversation, `demo` runs sample queries, `log` shows recent
    /// tool calls and `stats` shows session metrics.
    Chat,

    /// List the tools advertised by the MCP server.
    Tools,

    /// Search the knowledge base without generating an answer.
    #[command(after_help = r#"Examples:
  omnitech-agent search "warranty"
  omnitech-agent search "shipping times" -k 3
"#)]
    Search {
        /// Search text.
        query: String,

        /// Maximum number of matches.
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are never overwritten.
    InitPrompts {
        /// Target directory (defaults to ~/.config/omnitech-agent/prompts).
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_parse_ask_with_globals() {
        let cli = parse(&[
            "omnitech-agent",
            "--mcp-command",
            "python3",
            "--mcp-arg",
            "server.py",
            "--mcp-arg",
            "--quiet",
            "ask",
            "Where is my order?",
            "--format",
            "json",
        ]);
        assert_eq!(cli.mcp_command.as_deref(), Some("python3"));
        assert_eq!(cli.mcp_args, vec!["server.py", "--quiet"]);
        assert_eq!(cli.format, "json");
        assert!(matches!(cli.command, Commands::Ask { ref query } if query == "Where is my order?"));
    }

    #[test]
    fn test_parse_search_default_k() {
        let cli = parse(&["omnitech-agent", "search", "warranty"]);
        assert!(matches!(cli.command, Commands::Search { top_k: 5, .. }));
    }

    #[test]
    fn test_ask_requires_query() {
        assert!(Cli::try_parse_from(["omnitech-agent", "ask"]).is_err());
    }
}
