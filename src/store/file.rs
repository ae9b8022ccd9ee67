//! JSON-file summary store under the XDG data directory.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SummaryStore;
use crate::compaction::ConversationSummary;
use crate::error::StoreError;

/// File-backed summary store with JSON persistence.
///
/// The whole map is loaded on open and rewritten on every mutation via a
/// temporary file and rename, so a crash never leaves a half-written file.
pub struct FileSummaryStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, ConversationSummary>>,
}

impl FileSummaryStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Every stored summary, newest first.
    pub async fn list(&self) -> Vec<(String, ConversationSummary)> {
        let entries = self.entries.read().await;
        let mut all: Vec<_> = entries
            .iter()
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect();
        all.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        all
    }

    /// Remove a conversation's summary. Returns whether one existed.
    pub async fn delete(&self, conversation_id: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let existed = entries.remove(conversation_id).is_some();
        if existed {
            self.save(&entries)?;
        }
        Ok(existed)
    }

    fn save(&self, entries: &HashMap<String, ConversationSummary>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let data = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl SummaryStore for FileSummaryStore {
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
        self.save(&entries)
    }
}
