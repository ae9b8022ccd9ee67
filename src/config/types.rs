//! Struct definitions and serde defaults for kasane configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for kasane, deserialized from `config.toml`.
///
/// Fields use serde defaults so kasane can run with sensible defaults
/// when no config file exists.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default model identifier (e.g. `"claude-sonnet-4-6"`).
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Default provider name (e.g., "anthropic", "openai").
    #[serde(default)]
    pub default_provider: Option<String>,
    /// System prompt counted against the budget when none is given on the command line.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
    /// Context compaction settings.
    #[serde(default)]
    pub compaction: CompactionConfig,
    /// Per-model context window and cost overrides, keyed by model id.
    #[serde(default)]
    pub models: HashMap<String, ModelOverride>,
}

/// Returns the default model identifier (`"claude-sonnet-4-6"`).
///
/// Used by serde's `#[serde(default)]` attribute during deserialization.
pub(super) fn default_model() -> String {
    crate::constants::DEFAULT_MODEL.to_string()
}

fn default_system_prompt() -> Option<String> {
    Some(crate::constants::DEFAULT_SYSTEM_PROMPT.to_string())
}

/// Provider-specific configuration map.
///
/// Each field corresponds to a supported LLM provider. Only providers
/// the user has configured will be `Some`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderConfig {
    pub openai: Option<ProviderEntry>,
    pub anthropic: Option<ProviderEntry>,
    pub ollama: Option<ProviderEntry>,
    pub openrouter: Option<ProviderEntry>,
}

/// Connection details for a single LLM provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderEntry {
    /// API key for authentication. Can also be set via environment variables.
    pub api_key: Option<String>,
    /// Custom base URL for the provider's API (useful for proxies or self-hosted instances).
    pub base_url: Option<String>,
    /// Model identifier to use with this provider, overriding the global default.
    pub model: Option<String>,
}

/// Which token estimator compaction uses.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tokenizer {
    /// Character ratios from the model registry.
    #[default]
    Heuristic,
    /// tiktoken BPE counts.
    Bpe,
}

/// Configuration for context compaction.
///
/// Every field is optional; unset fields fall back to the defaults in
/// [`crate::constants`].
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct CompactionConfig {
    /// Fraction (0.0–1.0) of the context window a request may fill.
    pub threshold_ratio: Option<f64>,
    /// Newest messages always kept verbatim.
    pub recent_window: Option<usize>,
    /// Upper bound on summary size, in tokens.
    pub max_summary_tokens: Option<usize>,
    /// Per-message character cap in the summarization prompt.
    pub message_char_cap: Option<usize>,
    /// Per-tool-result character cap in the summarization prompt.
    pub tool_result_char_cap: Option<usize>,
    /// Model used for summarization; defaults to the chat model.
    pub summary_model: Option<String>,
    /// Seconds before a summarization call is abandoned.
    pub summary_timeout_secs: Option<u64>,
    pub tokenizer: Option<Tokenizer>,
}

/// User correction for a model's registry entry.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelOverride {
    pub context_window: Option<usize>,
    pub chars_per_token: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            provider: ProviderConfig::default(),
            system_prompt: default_system_prompt(),
            default_provider: None,
            compaction: CompactionConfig::default(),
            models: HashMap::new(),
        }
    }
}
