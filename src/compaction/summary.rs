//! Persisted summary record and the outcome returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{SUMMARY_CONTEXT_HEADER, SUMMARY_MESSAGE_FOOTER, SUMMARY_MESSAGE_HEADER};
use crate::message::Message;

/// The one persisted summary of a conversation.
///
/// `covered_until_*` is the high-water mark: everything up to and including
/// that message is represented by `summary` rather than sent raw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub summary: String,
    pub covered_until_message_id: String,
    pub covered_until_sequence: u64,
    pub created_at: DateTime<Utc>,
}

/// Summary fields plus whether the stored summary was reused verbatim.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryMetadata {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub used_existing: bool,
}

/// Which branch of the compaction decision tree produced an outcome.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompactionBranch {
    /// The request fit, or there was nothing that could be compacted.
    Untouched,
    /// Oldest messages were dropped without summarizing.
    Trimmed,
    /// A stored summary was reused without calling the summarizer.
    ReusedSummary,
    /// A stored summary was folded together with newer messages.
    ExtendedSummary,
    /// A new summary was generated from raw messages.
    FreshSummary,
}

/// What the reply-generation caller receives.
#[derive(Debug, Clone, Serialize)]
pub struct CompactionOutcome {
    /// Messages to send; a synthetic summary, when present, comes first.
    pub final_messages: Vec<Message>,
    pub summary: Option<SummaryMetadata>,
    pub branch: CompactionBranch,
    /// Estimated request size before compaction.
    pub tokens_before: usize,
    /// Estimated request size of `final_messages` plus the system prompt.
    pub tokens_after: usize,
}

impl ConversationSummary {
    /// Structural reuse check: non-empty text and a high-water mark id.
    pub fn is_candidate(&self) -> bool {
        !self.summary.trim().is_empty() && !self.covered_until_message_id.is_empty()
    }

    pub fn into_metadata(self, used_existing: bool) -> SummaryMetadata {
        SummaryMetadata {
            summary: self,
            used_existing,
        }
    }
}

/// The synthetic message that stands in for summarized history.
///
/// Delimited so the reply model reads it as background, not as a turn it
/// has to answer.
pub fn summary_message(summary: &str) -> Message {
    Message::assistant(
        format!("summary-{}", uuid::Uuid::new_v4()),
        format!("{SUMMARY_MESSAGE_HEADER}\n{summary}\n{SUMMARY_MESSAGE_FOOTER}"),
    )
}

/// The pseudo-message that carries an existing summary into an extension round.
pub fn summary_context_message(summary: &str) -> Message {
    Message::system(
        "summary-context",
        format!("{SUMMARY_CONTEXT_HEADER}\n{summary}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn summary(text: &str, id: &str) -> ConversationSummary {
        ConversationSummary {
            summary: text.to_string(),
            covered_until_message_id: id.to_string(),
            covered_until_sequence: 6,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_candidate_requires_text_and_mark() {
        assert!(summary("talked about rust", "m6").is_candidate());
        assert!(!summary("   ", "m6").is_candidate());
        assert!(!summary("talked about rust", "").is_candidate());
    }

    #[test]
    fn test_summary_message_is_delimited() {
        let msg = summary_message("User wants a CLI.");
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.id.starts_with("summary-"));
        let text = msg.text();
        assert!(text.starts_with(SUMMARY_MESSAGE_HEADER));
        assert!(text.contains("User wants a CLI."));
        assert!(text.ends_with(SUMMARY_MESSAGE_FOOTER));
    }

    #[test]
    fn test_metadata_serializes_flat() {
        let meta = summary("notes", "m6").into_metadata(true);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["covered_until_sequence"], 6);
        assert_eq!(json["used_existing"], true);
        assert_eq!(json["summary"], "notes");
    }
}
