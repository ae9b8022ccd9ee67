//! Entry point for kasane, a context compaction engine for LLM conversations.
//!
//! This binary loads environment variables, sets up logging, parses CLI
//! arguments via [`cli`], and dispatches to the appropriate subcommand handler.

mod cli;
mod compaction;
mod config;
mod constants;
mod conversation;
mod error;
mod format;
mod message;
mod models;
mod provider;
mod store;
mod tokens;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Runs the kasane CLI.
///
/// Loads `.env` files (silently ignored if absent), installs a stderr
/// tracing subscriber filtered by `RUST_LOG` (default `kasane=warn`), parses
/// command-line arguments, and dispatches the chosen subcommand.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kasane=warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = cli::parse();
    cli::run(cli).await
}
