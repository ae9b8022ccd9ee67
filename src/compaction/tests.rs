use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::*;
use crate::error::StoreError;
use crate::message::Message;
use crate::models::{ModelRegistry, TokenCostProfile};
use crate::store::{MemorySummaryStore, MessageIndex, SummaryStore};
use crate::tokens::HeuristicEstimator;

const SUMMARY_TEXT: &str = "User and assistant covered the early plan.";

struct FixedWindow(usize);

impl ModelRegistry for FixedWindow {
    fn context_window(&self, _model: &str) -> usize {
        self.0
    }

    fn cost_profile(&self, _model: &str) -> TokenCostProfile {
        TokenCostProfile::default()
    }
}

#[derive(Default)]
struct CountingCompletion {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl CountingCompletion {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextCompletion for CountingCompletion {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(SUMMARY_TEXT.to_string())
    }
}

/// Memory store that counts every access.
#[derive(Default)]
struct CountingStore {
    inner: MemorySummaryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

#[async_trait]
impl SummaryStore for CountingStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationSummary>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(conversation_id).await
    }

    async fn set(
        &self,
        conversation_id: &str,
        summary: ConversationSummary,
    ) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(conversation_id, summary).await
    }
}

struct FailingStore;

#[async_trait]
impl SummaryStore for FailingStore {
    async fn get(&self, _: &str) -> Result<Option<ConversationSummary>, StoreError> {
        Err(StoreError::Backend("database unavailable".into()))
    }

    async fn set(&self, _: &str, _: ConversationSummary) -> Result<(), StoreError> {
        Err(StoreError::Backend("database unavailable".into()))
    }
}

/// Window 1250 at the default 0.8 ratio gives a 1000-token threshold.
fn compactor(completion: Arc<CountingCompletion>) -> WindowCompactor {
    let registry: Arc<dyn ModelRegistry> = Arc::new(FixedWindow(1_250));
    let policy = CompactionPolicy::default();
    WindowCompactor::new(
        Arc::new(HeuristicEstimator::new(registry.clone())),
        registry,
        SummaryGenerator::new(completion, policy.summary_limits(None)),
        policy,
    )
}

/// `count` messages of 150 tokens each, sequence numbers from 1.
fn conversation(count: u64) -> Vec<Message> {
    (1..=count)
        .map(|i| {
            let text = format!("{i:03}{}", "x".repeat(597));
            let msg = if i % 2 == 1 {
                Message::user(format!("m{i}"), text)
            } else {
                Message::assistant(format!("m{i}"), text)
            };
            msg.with_sequence(i)
        })
        .collect()
}

/// 400 characters, 100 tokens.
fn system_prompt() -> String {
    "s".repeat(400)
}

fn request<'a>(messages: &'a [Message], system_prompt: &'a str) -> CompactionRequest<'a> {
    CompactionRequest {
        messages,
        system_prompt,
        model: "test-model",
        conversation_id: Some("chat-1"),
        is_anonymous: false,
    }
}

fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

fn stored(covered_id: &str, covered_sequence: u64, text: &str) -> ConversationSummary {
    ConversationSummary {
        summary: text.to_string(),
        covered_until_message_id: covered_id.to_string(),
        covered_until_sequence: covered_sequence,
        created_at: Utc::now() - Duration::hours(1),
    }
}

#[tokio::test]
async fn test_fits_returns_input_unchanged() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m2", 2, "old summary"))
        .await
        .unwrap();
    let messages = conversation(3);
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;

    assert_eq!(outcome.branch, CompactionBranch::Untouched);
    assert_eq!(ids(&outcome.final_messages), vec!["m1", "m2", "m3"]);
    assert!(outcome.summary.is_none());
    assert_eq!(outcome.tokens_before, 550);
    assert_eq!(outcome.tokens_after, 550);
    assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_first_compaction_shape() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let messages = conversation(10);
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::FreshSummary);
    assert_eq!(outcome.tokens_before, 1_600);
    assert!(outcome.tokens_after <= 1_000);
    assert_eq!(outcome.final_messages.len(), 5);
    assert!(outcome.final_messages[0].id.starts_with("summary-"));
    assert!(outcome.final_messages[0].text().contains(SUMMARY_TEXT));
    assert_eq!(
        ids(&outcome.final_messages[1..]),
        vec!["m7", "m8", "m9", "m10"]
    );

    let meta = outcome.summary.unwrap();
    assert!(!meta.used_existing);
    assert_eq!(meta.summary.covered_until_sequence, 6);
    assert_eq!(meta.summary.covered_until_message_id, "m6");

    let persisted = store.inner.get("chat-1").await.unwrap().unwrap();
    assert_eq!(persisted.covered_until_sequence, 6);

    let prompts = completion.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("006"));
    assert!(!prompts[0].contains("007"));
}

#[tokio::test]
async fn test_second_call_reuses_without_generating() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let messages = conversation(10);
    let system = system_prompt();

    let first = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;
    let second = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    assert_eq!(first.branch, CompactionBranch::FreshSummary);
    assert_eq!(second.branch, CompactionBranch::ReusedSummary);
    assert_eq!(completion.calls(), 1);
    assert_eq!(store.sets.load(Ordering::SeqCst), 1);

    let meta = second.summary.unwrap();
    assert!(meta.used_existing);
    assert_eq!(meta.summary.covered_until_sequence, 6);
    assert_eq!(
        ids(&second.final_messages[1..]),
        vec!["m7", "m8", "m9", "m10"]
    );
}

#[tokio::test]
async fn test_edit_in_covered_range_regenerates() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let mut messages = conversation(10);
    let system = system_prompt();

    compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    messages[5] = messages[5]
        .clone()
        .edited(Utc::now() + Duration::seconds(1));
    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;

    assert_eq!(outcome.branch, CompactionBranch::FreshSummary);
    assert_eq!(completion.calls(), 2);
    assert!(!outcome.summary.unwrap().used_existing);
}

#[tokio::test]
async fn test_anonymous_never_touches_store() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let messages = conversation(10);
    let system = system_prompt();

    let outcome = compactor
        .compact(
            CompactionRequest {
                is_anonymous: true,
                ..request(&messages, &system)
            },
            store.clone(),
        )
        .await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::Trimmed);
    assert!(outcome.summary.is_none());
    assert_eq!(
        ids(&outcome.final_messages),
        vec!["m5", "m6", "m7", "m8", "m9", "m10"]
    );
    assert_eq!(outcome.tokens_after, 1_000);
    assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    assert_eq!(store.sets.load(Ordering::SeqCst), 0);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_missing_conversation_id_trims() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let messages = conversation(10);
    let system = system_prompt();

    let outcome = compactor
        .compact(
            CompactionRequest {
                conversation_id: None,
                ..request(&messages, &system)
            },
            store.clone(),
        )
        .await;

    assert_eq!(outcome.branch, CompactionBranch::Trimmed);
    assert_eq!(store.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_message_stops_shrinking_at_one() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let mut messages = conversation(5);
    messages[4] = Message::user("m5", "y".repeat(10_000)).with_sequence(5);
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::FreshSummary);
    assert_eq!(outcome.final_messages.len(), 2);
    assert_eq!(outcome.final_messages[1].id, "m5");
    assert!(outcome.tokens_after > 1_000);

    let meta = outcome.summary.unwrap();
    assert_eq!(meta.summary.covered_until_message_id, "m4");
    assert_eq!(meta.summary.covered_until_sequence, 4);
    // Only m1 went through the summarizer; m2..m4 were moved by bookkeeping.
    assert_eq!(completion.calls(), 1);
    assert_eq!(
        store.inner.get("chat-1").await.unwrap().unwrap().covered_until_sequence,
        4
    );
}

#[tokio::test]
async fn test_single_oversized_message_is_kept() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let messages = vec![Message::user("m1", "y".repeat(10_000)).with_sequence(1)];
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;

    assert_eq!(outcome.branch, CompactionBranch::Untouched);
    assert_eq!(ids(&outcome.final_messages), vec!["m1"]);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_long_tail_extends_stored_summary() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m6", 6, "Earlier they picked Rust."))
        .await
        .unwrap();
    let messages = conversation(20);
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::ExtendedSummary);
    assert_eq!(
        ids(&outcome.final_messages[1..]),
        vec!["m17", "m18", "m19", "m20"]
    );

    let meta = outcome.summary.unwrap();
    assert!(!meta.used_existing);
    assert_eq!(meta.summary.covered_until_sequence, 16);
    assert_eq!(meta.summary.covered_until_message_id, "m16");

    let persisted = store.inner.get("chat-1").await.unwrap().unwrap();
    assert_eq!(persisted.covered_until_sequence, 16);
    assert_eq!(persisted.summary, SUMMARY_TEXT);

    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[0].contains("System: [Previous Summary Context]\nEarlier they picked Rust."));
    assert!(prompts[0].contains("007"));
    assert!(prompts[0].contains("016"));
    assert!(!prompts[0].contains("017"));
}

#[tokio::test]
async fn test_short_tail_reuses_even_over_budget() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m6", 6, &"long summary ".repeat(400)))
        .await
        .unwrap();
    let messages = conversation(10);
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;

    assert_eq!(outcome.branch, CompactionBranch::ReusedSummary);
    assert!(outcome.tokens_after > 1_000);
    assert!(outcome.summary.unwrap().used_existing);
    assert_eq!(outcome.final_messages.len(), 5);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_tail_only_history_extends_summary() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m6", 6, "Earlier recap."))
        .await
        .unwrap();
    // The client only sends what came after the covered point.
    let messages: Vec<Message> = conversation(14).split_off(6);
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;

    assert_eq!(outcome.branch, CompactionBranch::ExtendedSummary);
    assert_eq!(
        ids(&outcome.final_messages[1..]),
        vec!["m11", "m12", "m13", "m14"]
    );
    let meta = outcome.summary.unwrap();
    assert_eq!(meta.summary.covered_until_sequence, 10);
    assert_eq!(meta.summary.covered_until_message_id, "m10");
    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[0].contains("Earlier recap."));
}

#[tokio::test]
async fn test_store_failure_falls_back_to_fresh_summary() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let messages = conversation(10);
    let system = system_prompt();

    let outcome = compactor
        .compact(request(&messages, &system), Arc::new(FailingStore))
        .await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::FreshSummary);
    assert_eq!(outcome.final_messages.len(), 5);
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn test_regeneration_never_lowers_coverage() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m8", 8, "covers through eight"))
        .await
        .unwrap();
    let mut messages = conversation(10);
    messages[3] = messages[3].clone().edited(Utc::now());
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::FreshSummary);
    assert_eq!(ids(&outcome.final_messages[1..]), vec!["m9", "m10"]);
    let meta = outcome.summary.unwrap();
    assert_eq!(meta.summary.covered_until_sequence, 8);
    assert_eq!(meta.summary.covered_until_message_id, "m8");

    let persisted = store.inner.get("chat-1").await.unwrap().unwrap();
    assert_eq!(persisted.covered_until_sequence, 8);
    assert_eq!(persisted.covered_until_message_id, "m8");

    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[0].contains("008"));
    assert!(!prompts[0].contains("009"));
}

#[tokio::test]
async fn test_regenerated_summary_survives_tail_only_request() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m8", 8, "covers through eight"))
        .await
        .unwrap();
    let mut messages = conversation(10);
    messages[3] = messages[3].clone().edited(Utc::now());
    let system = system_prompt();

    let regenerated = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;
    assert_eq!(regenerated.branch, CompactionBranch::FreshSummary);

    // The client now sends only what followed the first six messages.
    let tail: Vec<Message> = conversation(16).split_off(6);
    let outcome = compactor.compact(request(&tail, &system), store.clone()).await;
    compactor.flush().await;

    assert!(matches!(
        outcome.branch,
        CompactionBranch::ReusedSummary | CompactionBranch::ExtendedSummary
    ));
    assert_eq!(completion.calls(), 2);
    assert_eq!(
        ids(&outcome.final_messages[1..]),
        vec!["m13", "m14", "m15", "m16"]
    );
    let meta = outcome.summary.unwrap();
    assert_eq!(meta.summary.covered_until_message_id, "m12");
    assert_eq!(meta.summary.covered_until_sequence, 12);

    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[1].contains("[Previous Summary Context]"));
    assert!(prompts[1].contains(SUMMARY_TEXT));
}

struct MapIndex(HashMap<String, u64>);

#[async_trait]
impl MessageIndex for MapIndex {
    async fn sequence_number(
        &self,
        message_id: &str,
        _conversation_id: &str,
    ) -> Result<Option<u64>, StoreError> {
        Ok(self.0.get(message_id).copied())
    }
}

#[tokio::test]
async fn test_index_detects_rewritten_history() {
    let completion = Arc::new(CountingCompletion::default());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m8", 8, "covers through eight"))
        .await
        .unwrap();
    // Rewritten history: new ids, no client sequence numbers, and the log
    // places the first one inside the covered range.
    let messages: Vec<Message> = conversation(10)
        .into_iter()
        .enumerate()
        .map(|(i, mut m)| {
            m.id = format!("r{}", i + 1);
            m.sequence_number = None;
            m
        })
        .collect();
    let index = MapIndex(HashMap::from([("r1".to_string(), 3)]));
    let compactor = compactor(completion.clone()).with_index(Arc::new(index));
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::FreshSummary);
    assert_eq!(completion.calls(), 1);
    assert!(!outcome.summary.unwrap().used_existing);
    let prompts = completion.prompts.lock().unwrap();
    assert!(!prompts[0].contains("covers through eight"));
}

#[tokio::test]
async fn test_index_overrides_client_sequence_numbers() {
    let completion = Arc::new(CountingCompletion::default());
    let store = Arc::new(CountingStore::default());
    store
        .inner
        .set("chat-1", stored("m8", 8, "covers through eight"))
        .await
        .unwrap();
    // Client numbering alone would put these inside the covered range, but
    // the log has never seen them.
    let messages: Vec<Message> = conversation(12)
        .into_iter()
        .map(|mut m| {
            m.id = m.id.replace('m', "n");
            m
        })
        .collect();
    let compactor = compactor(completion.clone())
        .with_index(Arc::new(MapIndex(HashMap::new())));
    let system = system_prompt();

    let outcome = compactor.compact(request(&messages, &system), store.clone()).await;
    compactor.flush().await;

    assert_eq!(outcome.branch, CompactionBranch::ExtendedSummary);
    assert_eq!(completion.calls(), 1);
    assert_eq!(
        ids(&outcome.final_messages[1..]),
        vec!["n9", "n10", "n11", "n12"]
    );
    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[0].contains("covers through eight"));
}

#[tokio::test]
async fn test_coverage_grows_across_rounds() {
    let completion = Arc::new(CountingCompletion::default());
    let compactor = compactor(completion.clone());
    let store = Arc::new(CountingStore::default());
    let system = system_prompt();
    let mut last = 0;

    for len in [10, 14, 20, 26] {
        let messages = conversation(len);
        let outcome = compactor.compact(request(&messages, &system), store.clone()).await;
        compactor.flush().await;
        let covered = outcome.summary.unwrap().summary.covered_until_sequence;
        assert!(covered >= last, "coverage went from {last} to {covered}");
        last = covered;
    }
    assert_eq!(last, 22);
}
