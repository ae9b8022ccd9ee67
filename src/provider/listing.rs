//! Model listing.
//!
//! Displays the model registry grouped by provider, with each model's
//! context window and the compaction threshold derived from it.

use anyhow::Result;
use colored::Colorize;

use super::resolve::resolve_model;
use crate::config::Config;
use crate::format::format_number;
use crate::models::{ModelRegistry, Models, MODEL_GROUPS};

/// List all known models, grouped by provider.
pub fn list_models(config: &Config) -> Result<()> {
    let selection = resolve_model(None, None, config)?;
    let current = &selection.model;
    let registry = Models::new(config.models.clone());
    let policy = config.compaction_policy();

    println!("Available models:\n");

    for (group, models) in MODEL_GROUPS {
        println!("  {}:", group.bold());
        for info in models.iter() {
            print_model(&registry, info.name, current, policy.threshold_ratio);
        }
        println!();
    }

    let mut configured: Vec<&String> = config
        .models
        .keys()
        .filter(|name| {
            !MODEL_GROUPS
                .iter()
                .any(|(_, group)| group.iter().any(|info| info.name == name.as_str()))
        })
        .collect();
    if !configured.is_empty() {
        configured.sort();
        println!("  {}:", "configured".bold());
        for name in configured {
            print_model(&registry, name, current, policy.threshold_ratio);
        }
    }

    Ok(())
}

fn print_model(registry: &Models, name: &str, current: &str, threshold_ratio: f64) {
    let window = registry.context_window(name);
    let threshold = (window as f64 * threshold_ratio).floor() as usize;
    let marker = if name == current { " (default)" } else { "" };
    println!(
        "    {name}{marker}  {}",
        format!(
            "{} ctx, compacts above {}",
            format_number(window),
            format_number(threshold)
        )
        .dimmed()
    );
}
