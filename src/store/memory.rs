//! In-memory summary store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SummaryStore;
use crate::compaction::ConversationSummary;
use crate::error::StoreError;

/// Summaries held in a process-local map.
///
/// Useful for tests and for embedding the engine in a long-running service
/// that persists elsewhere.
#[derive(Default)]
pub struct MemorySummaryStore {
    entries: RwLock<HashMap<String, ConversationSummary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationSummary>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(conversation_id).cloned())
    }

    async fn set(
        &self,
        conversation_id: &str,
        summary: ConversationSummary,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(conversation_id.to_string(), summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(seq: u64) -> ConversationSummary {
        ConversationSummary {
            summary: format!("covers {seq}"),
            covered_until_message_id: format!("m{seq}"),
            covered_until_sequence: seq,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemorySummaryStore::new();
        assert!(store.get("chat-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces() {
        let store = MemorySummaryStore::new();
        store.set("chat-1", summary(6)).await.unwrap();
        store.set("chat-1", summary(9)).await.unwrap();
        store.set("chat-2", summary(2)).await.unwrap();

        let loaded = store.get("chat-1").await.unwrap().unwrap();
        assert_eq!(loaded.covered_until_sequence, 9);
        assert_eq!(
            store.get("chat-2").await.unwrap().unwrap().covered_until_message_id,
            "m2"
        );
    }
}
