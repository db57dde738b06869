//! CLI command implementations.

use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::info;

use crate::agent::{AgentConfig, PromptSet, SyncAgent};
use crate::cli::output::{
    OutputFormat, format_call_log, format_matches, format_metrics, format_result, format_tools,
};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};

/// Queries run by the `demo` chat command.
pub const DEMO_QUERIES: [&str; 4] = [
    "How do I reset my password?",
    "My device won't turn on",
    "What is your return policy?",
    "Tell me about OmniTech",
];

/// Executes the CLI command.
///
/// Returns the text to print on stdout. The `chat` command writes its
/// transcript directly and returns only the farewell line.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the tool server cannot be
/// reached, or terminal I/O fails.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask { query } => {
            let agent = connect(cli)?;
            let result = agent.process_query(query);
            agent.shutdown()?;
            Ok(format_result(&result, format))
        }
        Commands::Chat => {
            let agent = connect(cli)?;
            let stdin = io::stdin();
            let mut stdout = io::stdout().lock();
            run_chat(&agent, stdin.lock(), &mut stdout, format)?;
            agent.shutdown()?;
            Ok("Goodbye!\n".to_string())
        }
        Commands::Tools => {
            let agent = connect(cli)?;
            let out = format_tools(agent.available_tools(), format);
            agent.shutdown()?;
            Ok(out)
        }
        Commands::Search { query, top_k } => {
            let agent = connect(cli)?;
            let matches = agent.search_knowledge(query, (*top_k).max(1));
            agent.shutdown()?;
            Ok(format_matches(query, &matches, format))
        }
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds the agent configuration: CLI flags, then environment, then defaults.
///
/// # Errors
///
/// Returns an error if the resulting configuration is invalid.
pub fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder();
    if let Some(cmd) = &cli.mcp_command {
        builder = builder.mcp_command(cmd);
    }
    if !cli.mcp_args.is_empty() {
        builder = builder.mcp_args(&cli.mcp_args);
    }
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(dir) = &cli.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    Ok(builder.from_env().build()?)
}

fn connect(cli: &Cli) -> Result<SyncAgent> {
    let config = build_config(cli)?;
    if !config.has_backend() {
        info!("no API token set (HF_TOKEN), answering from the knowledge base only");
    }
    Ok(SyncAgent::connect(config)?)
}

/// Runs the interactive loop until `exit`, `quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub fn run_chat<R: BufRead, W: Write>(
    agent: &SyncAgent,
    input: R,
    out: &mut W,
    format: OutputFormat,
) -> Result<()> {
    writeln!(
        out,
        "OmniTech Customer Support Agent\n\
         Type 'exit' to quit, 'clear' to reset the conversation, 'demo' for sample queries, \
         'log' for recent tool calls, 'stats' for session metrics.\n"
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "Query: ")?;
        out.flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let trimmed = line.trim();

        match trimmed.to_lowercase().as_str() {
            "" => {}
            "exit" | "quit" => break,
            "clear" => {
                agent.clear_history();
                writeln!(out, "Conversation cleared.\n")?;
            }
            "demo" => {
                for query in DEMO_QUERIES {
                    writeln!(out, "\nQuery: {query}")?;
                    let result = agent.process_query(query);
                    writeln!(out, "{}", format_result(&result, format))?;
                }
            }
            "log" => write!(out, "{}", format_call_log(&agent.call_log(), format))?,
            "stats" => write!(out, "{}", format_metrics(&agent.metrics(), format))?,
            _ => {
                let result = agent.process_query(trimmed);
                writeln!(out, "\n{}", format_result(&result, format))?;
            }
        }
    }
    Ok(())
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str("  ");
                output.push_str(
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown"),
                );
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the agent prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "directory": target_dir.to_string_lossy(),
            "written": written
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
            "count": written.len(),
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_cmd_init_prompts_writes_once() {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());

        let first = cmd_init_prompts(Some(temp_dir.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(first.contains("Wrote 4 prompt template(s)"));
        assert!(temp_dir.path().join("support.md").exists());

        let second = cmd_init_prompts(Some(temp_dir.path()), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value =
            serde_json::from_str(&second).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["count"], 0);
    }

    #[test]
    fn test_build_config_applies_flags() {
        let cli = Cli::try_parse_from([
            "omnitech-agent",
            "--mcp-command",
            "uv",
            "--mcp-arg",
            "run",
            "--mcp-arg",
            "server.py",
            "--model",
            "test-model",
            "tools",
        ])
        .unwrap_or_else(|_| unreachable!());

        let config = build_config(&cli).unwrap_or_else(|_| unreachable!());
        assert_eq!(config.mcp_command, "uv");
        assert_eq!(config.mcp_args, vec!["run", "server.py"]);
        assert_eq!(config.model, "test-model");
    }
}
