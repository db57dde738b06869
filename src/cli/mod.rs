//! CLI layer for the support agent.
//!
//! Provides the command-line interface using clap: one-shot questions,
//! an interactive chat, tool listing, knowledge search and prompt setup.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{execute, run_chat};
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
