//! Conversation context compaction.
//!
//! Keeps an arbitrarily long conversation inside a model's token budget by
//! replacing older history with a persisted, incrementally extended summary.
//!
//! - [`summary`]: the persisted summary record and the outcome type.
//! - [`validity`]: whether a stored summary may still be reused.
//! - [`summarizer`]: LLM-backed summary text with a deterministic fallback.
//! - [`compactor`]: the decision tree tying the pieces together.

mod compactor;
mod summarizer;
mod summary;
pub mod validity;

pub use compactor::{CompactionPolicy, CompactionRequest, WindowCompactor};
pub use summarizer::{SummaryGenerator, TextCompletion};
pub use summary::{CompactionBranch, CompactionOutcome, ConversationSummary};

#[cfg(test)]
mod tests;
