//! Centralized model registry for kasane.
//!
//! Defines known models with their context window sizes and token cost
//! profiles. The registry is the single source of truth for both the token
//! estimator and the compaction threshold.

use std::collections::HashMap;

use crate::config::ModelOverride;
use crate::constants::{DEFAULT_CHARS_PER_TOKEN, DEFAULT_CONTEXT_WINDOW, DENSE_CHARS_PER_TOKEN};

/// Information about a known LLM model.
pub struct ModelInfo {
    /// The model identifier string (e.g., "claude-sonnet-4-6").
    pub name: &'static str,
    /// Context window size in tokens.
    pub context_window: usize,
}

/// Coefficients the heuristic estimator uses for a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenCostProfile {
    /// Characters per token for Latin-script text.
    pub chars_per_token: f64,
    /// Characters per token for Hangul/CJK-heavy text.
    pub dense_chars_per_token: f64,
}

impl Default for TokenCostProfile {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            dense_chars_per_token: DENSE_CHARS_PER_TOKEN,
        }
    }
}

/// Lookup of per-model limits and coefficients.
pub trait ModelRegistry: Send + Sync {
    /// Context window in tokens; unknown models get the default window.
    fn context_window(&self, model: &str) -> usize;

    /// Cost profile; unknown models get the default profile.
    fn cost_profile(&self, model: &str) -> TokenCostProfile;
}

/// Known Anthropic models.
pub const ANTHROPIC_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "claude-opus-4-6",
        context_window: 200_000,
    },
    ModelInfo {
        name: "claude-sonnet-4-6",
        context_window: 200_000,
    },
    ModelInfo {
        name: "claude-haiku-4-5",
        context_window: 200_000,
    },
    ModelInfo {
        name: "claude-sonnet-4-5",
        context_window: 200_000,
    },
];

/// Known OpenAI models.
pub const OPENAI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gpt-4.1",
        context_window: 1_047_576,
    },
    ModelInfo {
        name: "gpt-4.1-mini",
        context_window: 1_047_576,
    },
    ModelInfo {
        name: "gpt-4o",
        context_window: 128_000,
    },
    ModelInfo {
        name: "o3",
        context_window: 200_000,
    },
    ModelInfo {
        name: "o4-mini",
        context_window: 200_000,
    },
];

/// Known Google, DeepSeek and hosted open-weight models.
pub const OTHER_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gemini-2.5-flash",
        context_window: 1_024_000,
    },
    ModelInfo {
        name: "gemini-2.5-flash-lite",
        context_window: 1_024_000,
    },
    ModelInfo {
        name: "deepseek-chat",
        context_window: 128_000,
    },
    ModelInfo {
        name: "moonshotai/kimi-k2-instruct",
        context_window: 131_000,
    },
];

/// Common Ollama models with known context window sizes.
pub const OLLAMA_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "llama3",
        context_window: 8_192,
    },
    ModelInfo {
        name: "mistral",
        context_window: 32_768,
    },
];

/// Every built-in model group, labelled for listing.
pub const MODEL_GROUPS: &[(&str, &[ModelInfo])] = &[
    ("anthropic", ANTHROPIC_MODELS),
    ("openai", OPENAI_MODELS),
    ("other", OTHER_MODELS),
    ("ollama", OLLAMA_MODELS),
];

/// Built-in table plus config-supplied overrides.
///
/// Overrides win over built-ins, so a user can register a model kasane
/// does not ship with or correct a window size without a release.
#[derive(Debug, Clone, Default)]
pub struct Models {
    overrides: HashMap<String, ModelOverride>,
}

impl Models {
    pub fn new(overrides: HashMap<String, ModelOverride>) -> Self {
        Self { overrides }
    }

    fn builtin_window(model: &str) -> Option<usize> {
        MODEL_GROUPS
            .iter()
            .flat_map(|(_, group)| group.iter())
            .find(|info| info.name == model)
            .map(|info| info.context_window)
    }
}

impl ModelRegistry for Models {
    fn context_window(&self, model: &str) -> usize {
        self.overrides
            .get(model)
            .and_then(|o| o.context_window)
            .or_else(|| Self::builtin_window(model))
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_CONTEXT_WINDOW)
    }

    fn cost_profile(&self, model: &str) -> TokenCostProfile {
        let mut profile = TokenCostProfile::default();
        if let Some(ratio) = self
            .overrides
            .get(model)
            .and_then(|o| o.chars_per_token)
            .filter(|r| *r > 0.0)
        {
            profile.chars_per_token = ratio;
        }
        profile
    }
}
