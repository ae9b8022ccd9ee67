//! Token estimation for kasane.
//!
//! [`TokenEstimator`] is the seam between the compaction engine and whatever
//! counts tokens. [`HeuristicEstimator`] uses per-model character ratios from
//! the registry (with a denser ratio for Hangul/CJK text) and flat costs for
//! images and files. [`BpeEstimator`] swaps in tiktoken BPE counts for text
//! while keeping the same accounting for everything else.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tiktoken_rs::{get_bpe_from_model, CoreBPE};

use crate::constants::{
    CODE_FILE_TOKENS, DENSE_SCRIPT_SHARE, IMAGE_TOKENS, OTHER_FILE_TOKENS, PDF_TOKENS,
    TOKEN_USAGE_KEY, UNKNOWN_PART_TOKENS,
};
use crate::message::{Attachment, Content, Message, Part};
use crate::models::{ModelRegistry, TokenCostProfile};

static CODE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\.(js|ts|jsx|tsx|py|java|c|cpp|cs|go|rb|php|html|css|sql|scala|swift|kt|rs|dart|json|xml|yaml|yml)$",
    )
    .expect("static regex")
});

static IMAGE_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|bmp|webp|svg)$").expect("static regex"));

/// Counts tokens for text, messages, and whole requests.
///
/// Implementors only have to provide [`TokenEstimator::estimate`]; message
/// and request totals are derived from it. Estimation never fails.
pub trait TokenEstimator: Send + Sync {
    /// Tokens in a plain string for `model`.
    fn estimate(&self, text: &str, model: &str) -> usize;

    /// Tokens for one message, including parts, attachments, and tool results.
    ///
    /// A caller-supplied `token_count` or provider-reported usage wins over
    /// any estimate.
    fn estimate_message(&self, message: &Message, model: &str) -> usize {
        if let Some(count) = message.token_count {
            return count;
        }
        if let Some(reported) = message.reported_usage() {
            return reported;
        }

        let mut total = match &message.content {
            Content::Text(text) => self.estimate(text, model),
            Content::Parts(parts) => parts.iter().map(|p| self.estimate_part(p, model)).sum(),
        };

        total += message.attachments.iter().map(attachment_tokens).sum::<usize>();

        if let Some(results) = &message.tool_results {
            for (name, value) in results {
                if name == TOKEN_USAGE_KEY {
                    continue;
                }
                total += self.estimate(&value_text(value), model);
            }
        }

        total
    }

    /// Tokens for one content part.
    fn estimate_part(&self, part: &Part, model: &str) -> usize {
        match part {
            Part::Text { text } => self.estimate(text, model),
            Part::ToolResult { result, .. } => self.estimate(&value_text(result), model),
            Part::Image { .. } => IMAGE_TOKENS,
            Part::File {
                filename,
                media_type,
            } => file_tokens(filename.as_deref(), media_type.as_deref()),
            Part::Unknown => UNKNOWN_PART_TOKENS,
        }
    }

    /// System prompt plus every message.
    fn estimate_total(&self, messages: &[Message], system_prompt: &str, model: &str) -> usize {
        self.estimate(system_prompt, model)
            + messages
                .iter()
                .map(|m| self.estimate_message(m, model))
                .sum::<usize>()
    }
}

/// Character-ratio estimator driven by the model registry.
pub struct HeuristicEstimator {
    registry: Arc<dyn ModelRegistry>,
}

impl HeuristicEstimator {
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self { registry }
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str, model: &str) -> usize {
        estimate_with_profile(text, self.registry.cost_profile(model))
    }
}

/// Estimator that counts text with a BPE tokenizer.
///
/// Uses the model's own encoding when tiktoken knows it and cl100k_base
/// otherwise, which is a reasonable approximation for Anthropic and local
/// models.
pub struct BpeEstimator {
    fallback: Arc<CoreBPE>,
    /// Loaded encodings by model; building one is far costlier than encoding.
    by_model: Mutex<HashMap<String, Arc<CoreBPE>>>,
}

impl BpeEstimator {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            fallback: Arc::new(tiktoken_rs::cl100k_base()?),
            by_model: Mutex::new(HashMap::new()),
        })
    }

    fn bpe_for(&self, model: &str) -> Arc<CoreBPE> {
        let Ok(mut cache) = self.by_model.lock() else {
            return Arc::clone(&self.fallback);
        };
        cache
            .entry(model.to_string())
            .or_insert_with(|| match get_bpe_from_model(model) {
                Ok(bpe) => Arc::new(bpe),
                Err(_) => Arc::clone(&self.fallback),
            })
            .clone()
    }
}

impl TokenEstimator for BpeEstimator {
    fn estimate(&self, text: &str, model: &str) -> usize {
        self.bpe_for(model).encode_ordinary(text).len()
    }
}

/// Heuristic count for `text` under `profile`.
pub fn estimate_with_profile(text: &str, profile: TokenCostProfile) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        return 0;
    }
    let dense = text.chars().filter(|c| is_dense_script(*c)).count();
    let ratio = if dense as f64 / chars as f64 > DENSE_SCRIPT_SHARE {
        profile.dense_chars_per_token
    } else {
        profile.chars_per_token
    };
    (chars as f64 / ratio).ceil() as usize
}

/// Hangul, CJK ideographs, and Kana pack more tokens per character.
fn is_dense_script(c: char) -> bool {
    matches!(c,
        '\u{AC00}'..='\u{D7AF}'
        | '\u{1100}'..='\u{11FF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}')
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flat cost of a file part by name and media type.
pub fn file_tokens(filename: Option<&str>, media_type: Option<&str>) -> usize {
    let name = filename.unwrap_or_default().to_lowercase();
    let media = media_type.unwrap_or_default();
    if name.ends_with(".pdf") || media == "application/pdf" {
        PDF_TOKENS
    } else if CODE_FILE.is_match(&name) {
        CODE_FILE_TOKENS
    } else if media.starts_with("image/") || IMAGE_FILE.is_match(&name) {
        IMAGE_TOKENS
    } else {
        OTHER_FILE_TOKENS
    }
}

/// Cost of an attachment reference; upload-time metadata wins.
pub fn attachment_tokens(attachment: &Attachment) -> usize {
    if let Some(tokens) = attachment.estimated_tokens.filter(|t| *t > 0) {
        return tokens;
    }
    let content_type = attachment.content_type.as_deref().unwrap_or_default();
    match attachment.file_type.as_deref() {
        Some("image") => IMAGE_TOKENS,
        Some("pdf") => PDF_TOKENS,
        Some("code") => CODE_FILE_TOKENS,
        _ if content_type.starts_with("image/") => IMAGE_TOKENS,
        _ if content_type == "application/pdf" => PDF_TOKENS,
        _ => file_tokens(attachment.name.as_deref(), Some(content_type)),
    }
}
