//! Environment variable substitution, API key resolution, and compaction policy.

use std::time::Duration;

use super::types::{Config, ProviderEntry, Tokenizer};
use crate::compaction::CompactionPolicy;
use crate::constants::COMPACTION_SUMMARY_TIMEOUT_SECS_DEFAULT;

impl Config {
    /// Resolve {env:VAR_NAME} patterns in string fields.
    pub(super) fn resolve_substitutions(&mut self) {
        self.model = Self::resolve_str(&self.model);
        if let Some(ref mut sp) = self.system_prompt {
            *sp = Self::resolve_str(sp);
        }
        if let Some(ref mut dp) = self.default_provider {
            *dp = Self::resolve_str(dp);
        }
        if let Some(ref mut sm) = self.compaction.summary_model {
            *sm = Self::resolve_str(sm);
        }
        Self::resolve_provider_entry(&mut self.provider.openai);
        Self::resolve_provider_entry(&mut self.provider.anthropic);
        Self::resolve_provider_entry(&mut self.provider.ollama);
        Self::resolve_provider_entry(&mut self.provider.openrouter);
    }

    /// Resolves `{env:VAR}` patterns in a single provider entry's `api_key` and `base_url`.
    fn resolve_provider_entry(entry: &mut Option<ProviderEntry>) {
        if let Some(ref mut e) = entry {
            if let Some(ref mut key) = e.api_key {
                *key = Self::resolve_str(key);
            }
            if let Some(ref mut url) = e.base_url {
                *url = Self::resolve_str(url);
            }
        }
    }

    /// Replace {env:VAR} with the environment variable value.
    fn resolve_str(s: &str) -> String {
        let mut result = s.to_string();
        while let Some(start) = result.find("{env:") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 5..start + end];
                let value = std::env::var(var_name).unwrap_or_default();
                result = format!(
                    "{}{}{}",
                    &result[..start],
                    value,
                    &result[start + end + 1..]
                );
            } else {
                break;
            }
        }
        result
    }

    /// Resolve API key for a provider: env var first, then config value.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        let env_key = format!("{}_API_KEY", provider.to_uppercase());
        if let Ok(val) = std::env::var(&env_key) {
            if !val.is_empty() {
                return Some(val);
            }
        }

        self.provider_entry(provider)
            .as_ref()
            .and_then(|e| e.api_key.clone())
            .filter(|k| !k.is_empty())
    }

    /// The config entry for a provider by name.
    pub fn provider_entry(&self, provider: &str) -> &Option<ProviderEntry> {
        match provider {
            "openai" => &self.provider.openai,
            "anthropic" => &self.provider.anthropic,
            "ollama" => &self.provider.ollama,
            "openrouter" => &self.provider.openrouter,
            _ => &None,
        }
    }

    /// Get the configured default provider name, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Get the model name from config, stripping provider prefix if present.
    /// Returns None if the model is the compile-time default (meaning user hasn't configured it).
    pub fn model_name(&self) -> Option<String> {
        let m = &self.model;
        if m == crate::constants::DEFAULT_MODEL {
            return None;
        }
        if let Some((_prov, model)) = m.split_once('/') {
            Some(model.to_string())
        } else {
            Some(m.to_string())
        }
    }

    /// Compaction policy with config values over built-in defaults.
    ///
    /// Out-of-range values are ignored rather than rejected.
    pub fn compaction_policy(&self) -> CompactionPolicy {
        let defaults = CompactionPolicy::default();
        let c = &self.compaction;
        CompactionPolicy {
            threshold_ratio: c
                .threshold_ratio
                .filter(|r| *r > 0.0 && *r <= 1.0)
                .unwrap_or(defaults.threshold_ratio),
            recent_window: c
                .recent_window
                .filter(|n| *n > 0)
                .unwrap_or(defaults.recent_window),
            max_summary_tokens: c
                .max_summary_tokens
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_summary_tokens),
            message_char_cap: c
                .message_char_cap
                .filter(|n| *n > 0)
                .unwrap_or(defaults.message_char_cap),
            tool_result_char_cap: c
                .tool_result_char_cap
                .filter(|n| *n > 0)
                .unwrap_or(defaults.tool_result_char_cap),
        }
    }

    /// How long a summarization call may take. Zero disables the limit.
    pub fn summary_timeout(&self) -> Option<Duration> {
        match self
            .compaction
            .summary_timeout_secs
            .unwrap_or(COMPACTION_SUMMARY_TIMEOUT_SECS_DEFAULT)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn tokenizer(&self) -> Tokenizer {
        self.compaction.tokenizer.unwrap_or_default()
    }
}
