//! Persistence collaborators for the compaction engine.
//!
//! [`SummaryStore`] is a plain key-value contract for the one summary each
//! conversation may have. [`MessageIndex`] answers the durable
//! sequence-number lookups used to detect a summary whose foundation has
//! changed underneath it. Neither offers transactional guarantees.

mod file;
mod memory;

pub use file::FileSummaryStore;
pub use memory::MemorySummaryStore;

use async_trait::async_trait;

use crate::compaction::ConversationSummary;
use crate::error::StoreError;

/// Read/write access to persisted summaries keyed by conversation id.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Fetch the conversation's summary, if one was ever written.
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationSummary>, StoreError>;

    /// Replace the conversation's summary. Last write wins.
    async fn set(
        &self,
        conversation_id: &str,
        summary: ConversationSummary,
    ) -> Result<(), StoreError>;
}

/// Durable lookup of where a message sits in its conversation.
#[async_trait]
pub trait MessageIndex: Send + Sync {
    /// Sequence number of `message_id`, or `None` if the message is unknown.
    async fn sequence_number(
        &self,
        message_id: &str,
        conversation_id: &str,
    ) -> Result<Option<u64>, StoreError>;
}
