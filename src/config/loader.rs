//! File loading and merging for kasane configuration.

use anyhow::{Context, Result};
use std::fs;

use super::types::{default_model, CompactionConfig, Config, ProviderConfig};

impl Config {
    /// Loads the global config from `~/.config/kasane/config.toml`.
    ///
    /// If no config file exists, creates one with sensible defaults
    /// (including `{env:VAR}` placeholders for API keys) and returns it.
    pub(super) fn load_global() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default_toml = format!(
                r#"model = "{}"

[provider]

[provider.anthropic]
api_key = "{{env:ANTHROPIC_API_KEY}}"

[provider.openai]
api_key = "{{env:OPENAI_API_KEY}}"

[provider.openrouter]
api_key = "{{env:OPENROUTER_API_KEY}}"

[provider.ollama]
base_url = "http://localhost:11434"

[compaction]
# threshold_ratio = 0.8
# recent_window = 4
# max_summary_tokens = 32000
# summary_timeout_secs = 60
# tokenizer = "heuristic"
"#,
                default_model()
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let config: Config = toml::from_str(&default_toml)
                .with_context(|| "Failed to parse default config".to_string())?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }

    /// Look for kasane.toml in current dir, then walk up to git root.
    pub(super) fn load_project() -> Result<Option<Config>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let candidate = dir.join(crate::constants::PROJECT_CONFIG_FILENAME);
            if candidate.exists() {
                let contents = fs::read_to_string(&candidate)
                    .with_context(|| format!("Failed to read {:?}", candidate))?;
                let config: Config = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse {:?}", candidate))?;
                return Ok(Some(config));
            }
            // Stop at git root or filesystem root
            if dir.join(".git").exists() || !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Merge project config over global config.
    /// Project values win when present.
    pub(super) fn merge(global: Config, project: Config) -> Config {
        let mut models = global.models;
        models.extend(project.models);

        Config {
            model: if project.model != default_model() {
                project.model
            } else {
                global.model
            },
            provider: ProviderConfig {
                openai: project.provider.openai.or(global.provider.openai),
                anthropic: project.provider.anthropic.or(global.provider.anthropic),
                ollama: project.provider.ollama.or(global.provider.ollama),
                openrouter: project.provider.openrouter.or(global.provider.openrouter),
            },
            system_prompt: project.system_prompt.or(global.system_prompt),
            default_provider: project.default_provider.or(global.default_provider),
            compaction: CompactionConfig {
                threshold_ratio: project
                    .compaction
                    .threshold_ratio
                    .or(global.compaction.threshold_ratio),
                recent_window: project
                    .compaction
                    .recent_window
                    .or(global.compaction.recent_window),
                max_summary_tokens: project
                    .compaction
                    .max_summary_tokens
                    .or(global.compaction.max_summary_tokens),
                message_char_cap: project
                    .compaction
                    .message_char_cap
                    .or(global.compaction.message_char_cap),
                tool_result_char_cap: project
                    .compaction
                    .tool_result_char_cap
                    .or(global.compaction.tool_result_char_cap),
                summary_model: project
                    .compaction
                    .summary_model
                    .or(global.compaction.summary_model),
                summary_timeout_secs: project
                    .compaction
                    .summary_timeout_secs
                    .or(global.compaction.summary_timeout_secs),
                tokenizer: project.compaction.tokenizer.or(global.compaction.tokenizer),
            },
            models,
        }
    }
}
