//! Durable conversation logs for kasane.
//!
//! Each conversation is stored as a JSONL file under
//! `~/.local/share/kasane/conversations/<id>.jsonl`. The log is the
//! authority on sequence numbers: the first time a message id is recorded it
//! gets the next number, and that number is never reused. An edited message
//! is appended again under its original number; on load, the latest line for
//! an id wins while the original order is kept.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;
use crate::message::Message;
use crate::store::MessageIndex;

/// Directory of per-conversation JSONL logs.
pub struct ConversationLog {
    dir: PathBuf,
}

impl ConversationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The log under kasane's data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Config::conversations_dir()?))
    }

    /// Messages of a conversation in order, with edits applied.
    pub fn load(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let path = self.path(conversation_id)?;
        read_log(&path).with_context(|| format!("Failed to read conversation log {:?}", path))
    }

    /// Record `messages` and return them carrying durable sequence numbers.
    ///
    /// Unknown ids are appended with fresh numbers. Known ids keep their
    /// number; they are appended again only if the incoming copy carries an
    /// edit the log has not seen.
    pub fn record(&self, conversation_id: &str, messages: &[Message]) -> Result<Vec<Message>> {
        let path = self.path(conversation_id)?;
        fs::create_dir_all(&self.dir).context("Failed to create conversations directory")?;

        let existing = read_log(&path)
            .with_context(|| format!("Failed to read conversation log {:?}", path))?;
        let known: HashMap<&str, &Message> = existing.iter().map(|m| (m.id.as_str(), m)).collect();
        let mut next = existing
            .iter()
            .filter_map(|m| m.sequence_number)
            .max()
            .unwrap_or(0)
            + 1;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open conversation log {:?}", path))?;

        let mut recorded = Vec::with_capacity(messages.len());
        let mut appended = 0usize;
        for msg in messages {
            let mut msg = msg.clone();
            match known.get(msg.id.as_str()) {
                Some(stored) => {
                    msg.sequence_number = stored.sequence_number;
                    if msg.is_edited && msg.edited_at != stored.edited_at {
                        writeln!(file, "{}", serde_json::to_string(&msg)?)?;
                        appended += 1;
                    }
                }
                None => {
                    msg = msg.with_sequence(next);
                    next += 1;
                    writeln!(file, "{}", serde_json::to_string(&msg)?)?;
                    appended += 1;
                }
            }
            recorded.push(msg);
        }
        file.flush()?;

        debug!(
            conversation = conversation_id,
            appended,
            total = recorded.len(),
            "recorded conversation"
        );
        Ok(recorded)
    }

    /// Deletes a conversation's log. Returns whether one existed.
    pub fn delete(&self, conversation_id: &str) -> Result<bool> {
        let path = self.path(conversation_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete conversation log {:?}", path))?;
        Ok(true)
    }

    fn path(&self, conversation_id: &str) -> Result<PathBuf> {
        anyhow::ensure!(
            !conversation_id.is_empty()
                && conversation_id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                && !conversation_id.starts_with('.'),
            "Invalid conversation id '{}'",
            conversation_id
        );
        Ok(self.dir.join(format!("{}.jsonl", conversation_id)))
    }
}

#[async_trait]
impl MessageIndex for ConversationLog {
    async fn sequence_number(
        &self,
        message_id: &str,
        conversation_id: &str,
    ) -> Result<Option<u64>, StoreError> {
        let path = self
            .path(conversation_id)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let messages = read_log(&path)?;
        Ok(messages
            .iter()
            .find(|m| m.id == message_id)
            .and_then(|m| m.sequence_number))
    }
}

/// Reads a JSONL log, returning an empty list if the file does not exist.
fn read_log(path: &Path) -> Result<Vec<Message>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut messages: Vec<Message> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let msg: Message = serde_json::from_str(&line)?;
        match position.get(&msg.id) {
            Some(&idx) => messages[idx] = msg,
            None => {
                position.insert(msg.id.clone(), messages.len());
                messages.push(msg);
            }
        }
    }
    Ok(messages)
}

/// Reads a transcript file: one JSON message per line, or a JSON array.
pub fn read_transcript(path: &Path) -> Result<Vec<Message>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {:?}", path))?;
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse transcript {:?}", path));
    }
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse message on line {} of {:?}", n + 1, path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn log() -> (tempfile::TempDir, ConversationLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = ConversationLog::new(dir.path().join("conversations"));
        (dir, log)
    }

    #[test]
    fn test_record_assigns_increasing_sequences() {
        let (_dir, log) = log();
        let first = log
            .record(
                "chat-1",
                &[Message::user("a", "hi"), Message::assistant("b", "hello")],
            )
            .unwrap();
        assert_eq!(first[0].sequence_number, Some(1));
        assert_eq!(first[1].sequence_number, Some(2));

        let second = log
            .record(
                "chat-1",
                &[
                    Message::user("a", "hi"),
                    Message::assistant("b", "hello"),
                    Message::user("c", "more"),
                ],
            )
            .unwrap();
        let seqs: Vec<_> = second.iter().map(|m| m.sequence_number).collect();
        assert_eq!(seqs, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(log.load("chat-1").unwrap().len(), 3);
    }

    #[test]
    fn test_client_sequence_numbers_are_ignored() {
        let (_dir, log) = log();
        let recorded = log
            .record("chat-1", &[Message::user("a", "hi").with_sequence(40)])
            .unwrap();
        assert_eq!(recorded[0].sequence_number, Some(1));
    }

    #[test]
    fn test_edit_is_appended_under_original_sequence() {
        let (_dir, log) = log();
        log.record("chat-1", &[Message::user("a", "hi"), Message::user("b", "x")])
            .unwrap();

        let edited = Message::user("a", "hi there").edited(Utc::now());
        let recorded = log.record("chat-1", &[edited]).unwrap();
        assert_eq!(recorded[0].sequence_number, Some(1));

        let loaded = log.load("chat-1").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[0].text(), "hi there");
        assert!(loaded[0].is_edited);
    }

    #[tokio::test]
    async fn test_sequence_lookup() {
        let (_dir, log) = log();
        log.record("chat-1", &[Message::user("a", "hi"), Message::user("b", "x")])
            .unwrap();
        assert_eq!(log.sequence_number("b", "chat-1").await.unwrap(), Some(2));
        assert_eq!(log.sequence_number("zz", "chat-1").await.unwrap(), None);
        assert_eq!(log.sequence_number("a", "other").await.unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let (_dir, log) = log();
        assert!(log.load("../etc/passwd").is_err());
        assert!(log.load("").is_err());
    }

    #[test]
    fn test_read_transcript_jsonl_and_array() {
        let dir = tempfile::tempdir().unwrap();
        let jsonl = dir.path().join("t.jsonl");
        std::fs::write(
            &jsonl,
            "{\"id\":\"a\",\"role\":\"user\",\"content\":\"hi\"}\n\n{\"id\":\"b\",\"role\":\"assistant\",\"content\":[{\"type\":\"text\",\"text\":\"yo\"}]}\n",
        )
        .unwrap();
        let messages = read_transcript(&jsonl).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "yo");

        let array = dir.path().join("t.json");
        std::fs::write(&array, "[{\"id\":\"a\",\"role\":\"user\",\"content\":\"hi\"}]").unwrap();
        assert_eq!(read_transcript(&array).unwrap().len(), 1);
    }
}
