//! Stored-summary CLI operations for kasane.
//!
//! Handles listing, showing, and clearing persisted summaries through the
//! `kasane summary` subcommand family. Listing adapts its preview column to
//! the terminal width.

use anyhow::{Context, Result};
use colored::Colorize;

use super::SummaryAction;
use crate::config::Config;
use crate::conversation::ConversationLog;
use crate::format::render_markdown_lite;
use crate::store::{FileSummaryStore, SummaryStore};

fn open_store() -> Result<FileSummaryStore> {
    let path = Config::summary_store_path()?;
    FileSummaryStore::open(&path).with_context(|| format!("Failed to open summary store {:?}", path))
}

/// Dispatches a summary subcommand to its handler.
pub(crate) async fn handle_summary(action: SummaryAction) -> Result<()> {
    match action {
        SummaryAction::List => summary_list().await,
        SummaryAction::Show { conversation } => summary_show(&conversation).await,
        SummaryAction::Clear { conversation, log } => summary_clear(&conversation, log).await,
    }
}

/// Lists stored summaries in a table, newest first.
async fn summary_list() -> Result<()> {
    let store = open_store()?;
    let summaries = store.list().await;
    if summaries.is_empty() {
        println!("{}", "No stored summaries.".dimmed());
        println!(
            "Create one with: {}",
            "kasane compact <transcript> --conversation <id>".cyan()
        );
        return Ok(());
    }

    let term_width = terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80);

    let id_width = summaries
        .iter()
        .map(|(id, _)| id.chars().count())
        .max()
        .unwrap_or(2)
        .clamp(2, 24);
    // ID, COVERED=10, CREATED=18, gaps between columns
    let fixed_cols = id_width + 10 + 18 + 3;
    let preview_width = term_width.saturating_sub(fixed_cols).clamp(10, 60);

    println!(
        "{} {} {} {}",
        format!("{:<iw$}", "ID", iw = id_width).bold(),
        format!("{:<10}", "COVERED").bold(),
        format!("{:<18}", "CREATED").bold(),
        "SUMMARY".bold(),
    );
    println!("{}", "-".repeat(term_width.min(fixed_cols + preview_width)));

    for (id, s) in &summaries {
        let id = truncate(id, id_width);
        let preview = truncate(&s.summary.replace('\n', " "), preview_width);
        let created = s.created_at.format("%Y-%m-%d %H:%M").to_string();

        // Pad first, then colorize to avoid ANSI escape code width issues
        let id_col = format!("{:<iw$}", id, iw = id_width);
        let covered_col = format!("{:<10}", format!("#{}", s.covered_until_sequence));
        let created_col = format!("{:<18}", created);

        println!(
            "{} {} {} {}",
            id_col.cyan(),
            covered_col.yellow(),
            created_col.dimmed(),
            preview,
        );
    }
    println!();
    println!(
        "{} {} summaries. Show one with: {}",
        "total:".dimmed(),
        summaries.len(),
        "kasane summary show <id>".cyan()
    );
    Ok(())
}

async fn summary_show(conversation: &str) -> Result<()> {
    let store = open_store()?;
    let summary = store
        .get(conversation)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No stored summary for conversation '{}'", conversation))?;

    println!("{} {}", "conversation:".bold(), conversation.cyan());
    println!(
        "{} {} (#{})",
        "covers through:".bold(),
        summary.covered_until_message_id,
        summary.covered_until_sequence
    );
    println!(
        "{} {}",
        "created:".bold(),
        summary.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    println!("{}", render_markdown_lite(&summary.summary));
    Ok(())
}

async fn summary_clear(conversation: &str, log: bool) -> Result<()> {
    let store = open_store()?;
    if store.delete(conversation).await? {
        println!("Cleared summary for {}", conversation.cyan());
    } else {
        println!("{}", format!("No stored summary for '{}'.", conversation).dimmed());
    }

    if log {
        if ConversationLog::open_default()?.delete(conversation)? {
            println!("Deleted conversation log for {}", conversation.cyan());
        } else {
            println!("{}", "No conversation log found.".dimmed());
        }
    }
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let truncated: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}
