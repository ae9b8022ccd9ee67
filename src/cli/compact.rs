//! `kasane compact` and `kasane estimate`.
//!
//! Wires the configured estimator, registry, provider, summary store, and
//! conversation log into a [`WindowCompactor`] and renders the outcome.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use tracing::warn;

use super::CompactArgs;
use crate::compaction::{CompactionRequest, SummaryGenerator, TextCompletion, WindowCompactor};
use crate::config::{Config, Tokenizer};
use crate::conversation::{read_transcript, ConversationLog};
use crate::format::{format_message, format_number, format_outcome_header, format_token_usage};
use crate::models::{ModelRegistry, Models};
use crate::provider::{self, Provider};
use crate::store::{FileSummaryStore, MemorySummaryStore, SummaryStore};
use crate::tokens::{BpeEstimator, HeuristicEstimator, TokenEstimator};

/// Completion that always fails, so summaries use the fallback text.
///
/// Used when no provider can be built (e.g. a missing API key); compaction
/// still runs and the anonymous, fast, and reuse paths never notice.
struct Unavailable(String);

#[async_trait]
impl TextCompletion for Unavailable {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(anyhow::anyhow!("{}", self.0))
    }
}

/// The estimator selected by `compaction.tokenizer`.
fn build_estimator(
    config: &Config,
    registry: Arc<dyn ModelRegistry>,
) -> Result<Arc<dyn TokenEstimator>> {
    Ok(match config.tokenizer() {
        Tokenizer::Heuristic => Arc::new(HeuristicEstimator::new(registry)),
        Tokenizer::Bpe => {
            Arc::new(BpeEstimator::new().context("Failed to load BPE tokenizer data")?)
        }
    })
}

/// The persistent store, or a scratch copy of it for `--dry-run`.
async fn open_summary_store(
    conversation_id: Option<&str>,
    dry_run: bool,
) -> Result<Arc<dyn SummaryStore>> {
    let path = Config::summary_store_path()?;
    let file = FileSummaryStore::open(&path)
        .with_context(|| format!("Failed to open summary store {:?}", path))?;
    if !dry_run {
        return Ok(Arc::new(file));
    }

    let scratch = MemorySummaryStore::new();
    if let Some(id) = conversation_id {
        if let Some(existing) = file.get(id).await? {
            scratch.set(id, existing).await?;
        }
    }
    Ok(Arc::new(scratch))
}

fn system_prompt(cli: Option<String>, config: &Config) -> String {
    cli.or_else(|| config.system_prompt.clone())
        .unwrap_or_default()
}

pub(crate) async fn run_compact(args: CompactArgs) -> Result<()> {
    let config = Config::load()?;
    let selection =
        provider::resolve_model(args.provider.as_deref(), args.model.as_deref(), &config)?;
    let system_prompt = system_prompt(args.system_prompt, &config);
    let conversation_id = args.conversation.as_deref().filter(|_| !args.anonymous);

    let registry: Arc<dyn ModelRegistry> = Arc::new(Models::new(config.models.clone()));
    let estimator = build_estimator(&config, registry.clone())?;

    let summary_selection = provider::resolve_summary_model(&selection, &config)?;
    let completion: Arc<dyn TextCompletion> =
        match Provider::from_config(&config, &summary_selection) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                warn!(error = %e, "no summarization provider, using fallback summaries");
                Arc::new(Unavailable(format!("{e:#}")))
            }
        };

    let policy = config.compaction_policy();
    let generator =
        SummaryGenerator::new(completion, policy.summary_limits(config.summary_timeout()));
    let mut compactor = WindowCompactor::new(estimator, registry.clone(), generator, policy);

    let messages = match (&args.transcript, conversation_id) {
        (Some(path), Some(id)) => {
            let log = ConversationLog::open_default()?;
            let transcript = read_transcript(path)?;
            let recorded = if args.dry_run {
                transcript
            } else {
                log.record(id, &transcript)?
            };
            compactor = compactor.with_index(Arc::new(log));
            recorded
        }
        (Some(path), None) => read_transcript(path)?,
        (None, Some(id)) => {
            let log = ConversationLog::open_default()?;
            let logged = log.load(id)?;
            if logged.is_empty() {
                bail!("No logged messages for conversation '{}'", id);
            }
            compactor = compactor.with_index(Arc::new(log));
            logged
        }
        (None, None) => {
            bail!("Pass a transcript file, or --conversation to compact a logged conversation")
        }
    };

    let store = open_summary_store(conversation_id, args.dry_run).await?;

    let request = CompactionRequest {
        messages: &messages,
        system_prompt: &system_prompt,
        model: &selection.model,
        conversation_id,
        is_anonymous: args.anonymous,
    };
    let outcome = compactor.compact(request, store).await;
    compactor.flush().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let threshold = policy.threshold(registry.context_window(&selection.model));
    let model_label = format!("{}/{}", selection.provider, selection.model);
    println!("{}", format_outcome_header(&outcome, &model_label, threshold));
    println!();
    for msg in &outcome.final_messages {
        println!("{}", format_message(msg));
        println!();
    }

    Ok(())
}

pub(crate) fn run_estimate(
    transcript: &Path,
    provider_name: Option<&str>,
    model: Option<&str>,
    system_prompt_arg: Option<String>,
) -> Result<()> {
    let config = Config::load()?;
    let selection = provider::resolve_model(provider_name, model, &config)?;
    let system_prompt = system_prompt(system_prompt_arg, &config);
    let messages = read_transcript(transcript)?;

    let registry: Arc<dyn ModelRegistry> = Arc::new(Models::new(config.models.clone()));
    let estimator = build_estimator(&config, registry.clone())?;
    let model = selection.model.as_str();

    let window = registry.context_window(model);
    let threshold = config.compaction_policy().threshold(window);

    println!(
        "{:<24} {:<10} {:>8}",
        "ID".bold(),
        "ROLE".bold(),
        "TOKENS".bold()
    );
    println!(
        "{:<24} {:<10} {:>8}",
        "(system prompt)".dimmed(),
        "system",
        format_number(estimator.estimate(&system_prompt, model))
    );
    for msg in &messages {
        let id: String = msg.id.chars().take(24).collect();
        println!(
            "{:<24} {:<10} {:>8}",
            id.cyan(),
            msg.role.to_string(),
            format_number(estimator.estimate_message(msg, model))
        );
    }

    let total = estimator.estimate_total(&messages, &system_prompt, model);
    println!();
    println!("{} {}", "model:".bold(), model);
    println!(
        "{} {} (window {})",
        "total:".bold(),
        format_token_usage(total, threshold),
        format_number(window)
    );
    if total > threshold {
        println!(
            "{}",
            format!(
                "Over budget by {} tokens; `kasane compact` would compact this transcript.",
                format_number(total - threshold)
            )
            .yellow()
        );
    } else {
        println!("{}", "Fits; no compaction needed.".green());
    }

    Ok(())
}
