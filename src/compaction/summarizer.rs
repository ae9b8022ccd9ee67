//! LLM-backed summary generation.
//!
//! [`SummaryGenerator`] turns a range of messages into bounded summary text
//! by prompting a [`TextCompletion`] collaborator. It never fails: any
//! provider error, timeout, or empty reply is replaced by a deterministic
//! fallback so compaction can always proceed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::constants::{
    COMPACTION_PROMPT, COMPACTION_PROMPT_TRAILER, FALLBACK_EXCERPT_CHARS, TOKEN_USAGE_KEY,
};
use crate::message::{Content, Message, Part, Role};

/// Anything that can complete a prompt into text.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Limits applied around a summarization call.
#[derive(Debug, Clone, Copy)]
pub struct SummaryLimits {
    /// Characters of each message kept in the summarization prompt.
    pub message_chars: usize,
    /// Characters of each tool result kept in the summarization prompt.
    pub tool_result_chars: usize,
    /// Characters of generated summary kept.
    pub summary_chars: usize,
    /// Give up on the provider after this long.
    pub timeout: Option<Duration>,
}

/// Summarizes message ranges through a completion provider.
pub struct SummaryGenerator {
    completion: Arc<dyn TextCompletion>,
    limits: SummaryLimits,
}

impl SummaryGenerator {
    pub fn new(completion: Arc<dyn TextCompletion>, limits: SummaryLimits) -> Self {
        Self { completion, limits }
    }

    /// Summarize `messages`, falling back to a canned summary on failure.
    pub async fn summarize(&self, messages: &[Message]) -> String {
        let prompt = self.build_prompt(messages);
        let call = self.completion.complete(&prompt);

        let reply = match self.limits.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(reply) => reply,
                Err(_) => Err(anyhow::anyhow!("summarization timed out after {limit:?}")),
            },
            None => call.await,
        };

        match reply {
            Ok(text) if !text.trim().is_empty() => {
                debug!(messages = messages.len(), chars = text.len(), "generated summary");
                truncate_chars(text.trim(), self.limits.summary_chars)
            }
            Ok(_) => {
                warn!("summarizer returned empty text, using fallback summary");
                fallback_summary(messages)
            }
            Err(e) => {
                warn!(error = %e, "failed to generate summary, using fallback summary");
                fallback_summary(messages)
            }
        }
    }

    /// The prompt sent to the provider for `messages`.
    pub fn build_prompt(&self, messages: &[Message]) -> String {
        let transcript = messages
            .iter()
            .map(|m| {
                let content = extract_text(m, self.limits.tool_result_chars);
                let content = if content.chars().count() > self.limits.message_chars {
                    format!(
                        "{}... [truncated]",
                        truncate_chars(&content, self.limits.message_chars)
                    )
                } else {
                    content
                };
                format!("{}: {}", role_label(m.role), content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!("{COMPACTION_PROMPT}{transcript}{COMPACTION_PROMPT_TRAILER}")
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => "System",
        Role::Tool => "Tool",
    }
}

/// All text a message carries, including tool output.
///
/// Tool results are labelled with their tool name and cut to
/// `tool_result_chars`; the provider token-usage entry is skipped.
pub fn extract_text(message: &Message, tool_result_chars: usize) -> String {
    let mut pieces: Vec<String> = Vec::new();

    match &message.content {
        Content::Text(text) => {
            if !text.is_empty() {
                pieces.push(text.clone());
            }
        }
        Content::Parts(parts) => {
            for part in parts {
                match part {
                    Part::Text { text } if !text.is_empty() => pieces.push(text.clone()),
                    Part::ToolResult { tool_name, result } => pieces.push(format!(
                        "[Tool: {}] {}",
                        tool_name,
                        truncate_chars(&value_text(result), tool_result_chars)
                    )),
                    _ => {}
                }
            }
        }
    }

    if let Some(results) = &message.tool_results {
        for (name, value) in results {
            if name == TOKEN_USAGE_KEY {
                continue;
            }
            pieces.push(format!(
                "[Tool: {}] {}",
                name,
                truncate_chars(&value_text(value), tool_result_chars)
            ));
        }
    }

    pieces.join("\n")
}

/// Deterministic stand-in when the provider cannot produce a summary.
pub fn fallback_summary(messages: &[Message]) -> String {
    let excerpt = messages
        .first()
        .map(|m| truncate_chars(&extract_text(m, FALLBACK_EXCERPT_CHARS), FALLBACK_EXCERPT_CHARS))
        .unwrap_or_default();
    format!(
        "Previous conversation contained {} messages. Topics discussed: {}...",
        messages.len(),
        excerpt
    )
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// First `max` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
