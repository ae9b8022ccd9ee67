//! Command-line interface definition and dispatch for kasane.
//!
//! Uses [`clap`] for argument parsing with derive macros. Compaction and
//! estimation live in the [`compact`] submodule, stored-summary operations in
//! [`summary`].

mod compact;
mod summary;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::{config, provider};

/// Top-level CLI structure for kasane.
#[derive(Parser)]
#[command(
    name = "kasane",
    about = "Keep long LLM conversations inside the context window"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the kasane CLI.
///
/// The `///` doc comments on variants double as `--help` text rendered by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Compact a transcript to fit the model's context window
    Compact(CompactArgs),
    /// Estimate the token cost of a transcript
    Estimate {
        /// Transcript file (JSONL, one message per line, or a JSON array)
        transcript: PathBuf,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
        /// Provider to use (anthropic, openai, openrouter, ollama)
        #[arg(short, long)]
        provider: Option<String>,
        /// System prompt counted against the budget (overrides config)
        #[arg(short, long)]
        system_prompt: Option<String>,
    },
    /// Inspect or remove stored summaries
    Summary {
        #[command(subcommand)]
        action: SummaryAction,
    },
    /// List known models and their budgets
    Models,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `kasane compact`.
#[derive(Args)]
pub struct CompactArgs {
    /// Transcript file (JSONL, one message per line, or a JSON array).
    /// Without one, the logged messages of --conversation are compacted.
    pub transcript: Option<PathBuf>,
    /// Conversation id used to persist and reuse the summary
    #[arg(short, long)]
    pub conversation: Option<String>,
    /// Never read or write stored summaries; trim instead
    #[arg(long)]
    pub anonymous: bool,
    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,
    /// Provider to use (anthropic, openai, openrouter, ollama)
    #[arg(short, long)]
    pub provider: Option<String>,
    /// System prompt counted against the budget (overrides config)
    #[arg(short, long)]
    pub system_prompt: Option<String>,
    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
    /// Compute the outcome without writing the summary or the conversation log
    #[arg(long)]
    pub dry_run: bool,
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current config
    Show,
}

/// Subcommands for the `summary` command.
#[derive(Subcommand)]
pub enum SummaryAction {
    /// List stored summaries
    List,
    /// Show a conversation's stored summary
    Show { conversation: String },
    /// Delete a conversation's stored summary
    Clear {
        conversation: String,
        /// Also delete the conversation log
        #[arg(long)]
        log: bool,
    },
}

/// Parses command-line arguments into a [`Cli`] struct.
///
/// Delegates to [`clap::Parser::parse`], which exits the process on invalid input.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compact(args) => compact::run_compact(args).await,
        Commands::Estimate {
            transcript,
            model,
            provider: provider_name,
            system_prompt,
        } => compact::run_estimate(
            &transcript,
            provider_name.as_deref(),
            model.as_deref(),
            system_prompt,
        ),
        Commands::Summary { action } => summary::handle_summary(action).await,
        Commands::Models => {
            let config = config::Config::load()?;
            provider::list_models(&config)
        }
        Commands::Config { action } => {
            let config = config::Config::load()?;
            match action {
                ConfigAction::Show => {
                    let path = config::Config::config_path()?;
                    println!("{} {}", "Config path:".bold(), path.display());
                    println!(
                        "{} {}",
                        "Data dir:".bold(),
                        config::Config::data_dir()?.display()
                    );
                    println!();
                    let toml_str = toml::to_string_pretty(&config)?;
                    println!("{}", toml_str);
                }
            }
            Ok(())
        }
    }
}
