//! The compaction decision tree.
//!
//! [`WindowCompactor::compact`] takes the full client history and returns
//! the message list to send to the reply model, kept under
//! `threshold_ratio` of the model's context window. In order of preference
//! it sends everything, reuses the stored summary, extends it with newer
//! messages, or generates a fresh one. Anonymous requests never touch the
//! store and are trimmed instead.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::summarizer::{SummaryGenerator, SummaryLimits};
use super::summary::{
    summary_context_message, summary_message, CompactionBranch, CompactionOutcome,
    ConversationSummary,
};
use super::validity::{self, Validity};
use crate::constants::{
    COMPACTION_MAX_SUMMARY_TOKENS_DEFAULT, COMPACTION_MESSAGE_CHAR_CAP_DEFAULT,
    COMPACTION_RECENT_WINDOW_DEFAULT, COMPACTION_THRESHOLD_DEFAULT,
    COMPACTION_TOOL_RESULT_CHAR_CAP_DEFAULT, DEFAULT_CHARS_PER_TOKEN,
};
use crate::message::Message;
use crate::models::ModelRegistry;
use crate::store::{MessageIndex, SummaryStore};
use crate::tokens::TokenEstimator;

/// Tunable knobs for compaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactionPolicy {
    /// Fraction of the context window a request may fill.
    pub threshold_ratio: f64,
    /// Newest messages always kept verbatim in a single pass.
    pub recent_window: usize,
    pub max_summary_tokens: usize,
    pub message_char_cap: usize,
    pub tool_result_char_cap: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            threshold_ratio: COMPACTION_THRESHOLD_DEFAULT,
            recent_window: COMPACTION_RECENT_WINDOW_DEFAULT,
            max_summary_tokens: COMPACTION_MAX_SUMMARY_TOKENS_DEFAULT,
            message_char_cap: COMPACTION_MESSAGE_CHAR_CAP_DEFAULT,
            tool_result_char_cap: COMPACTION_TOOL_RESULT_CHAR_CAP_DEFAULT,
        }
    }
}

impl CompactionPolicy {
    /// Token budget for a model with `context_window` tokens.
    pub fn threshold(&self, context_window: usize) -> usize {
        (context_window as f64 * self.threshold_ratio).floor() as usize
    }

    /// Summarizer limits derived from this policy.
    pub fn summary_limits(&self, timeout: Option<std::time::Duration>) -> SummaryLimits {
        SummaryLimits {
            message_chars: self.message_char_cap,
            tool_result_chars: self.tool_result_char_cap,
            summary_chars: (self.max_summary_tokens as f64 * DEFAULT_CHARS_PER_TOKEN) as usize,
            timeout,
        }
    }
}

/// One compaction call's inputs.
#[derive(Debug, Clone, Copy)]
pub struct CompactionRequest<'a> {
    pub messages: &'a [Message],
    pub system_prompt: &'a str,
    pub model: &'a str,
    pub conversation_id: Option<&'a str>,
    pub is_anonymous: bool,
}

/// Keeps conversations within a model's token budget.
pub struct WindowCompactor {
    estimator: Arc<dyn TokenEstimator>,
    registry: Arc<dyn ModelRegistry>,
    generator: SummaryGenerator,
    policy: CompactionPolicy,
    index: Option<Arc<dyn MessageIndex>>,
    /// Summary writes still in flight.
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl WindowCompactor {
    pub fn new(
        estimator: Arc<dyn TokenEstimator>,
        registry: Arc<dyn ModelRegistry>,
        generator: SummaryGenerator,
        policy: CompactionPolicy,
    ) -> Self {
        Self {
            estimator,
            registry,
            generator,
            policy,
            index: None,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Use `index` for durable sequence lookups in the stale-foundation check.
    pub fn with_index(mut self, index: Arc<dyn MessageIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Prepare `request.messages` for the reply model.
    ///
    /// Never fails. Store reads that error count as "no summary"; summary
    /// writes run on a detached task and only log on failure.
    pub async fn compact(
        &self,
        request: CompactionRequest<'_>,
        store: Arc<dyn SummaryStore>,
    ) -> CompactionOutcome {
        let threshold = self
            .policy
            .threshold(self.registry.context_window(request.model));
        let tokens_before =
            self.estimator
                .estimate_total(request.messages, request.system_prompt, request.model);

        debug!(
            model = request.model,
            messages = request.messages.len(),
            tokens_before,
            threshold,
            "compaction requested"
        );

        let conversation_id = match request.conversation_id {
            Some(id) if !request.is_anonymous => id,
            _ => return self.trim(&request, threshold, tokens_before),
        };

        if tokens_before <= threshold {
            return untouched(&request, tokens_before);
        }

        let existing = match store.get(conversation_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(conversation = conversation_id, error = %e, "failed to read stored summary");
                None
            }
        };

        if let Some(summary) = &existing {
            let verdict = validity::check(
                Some(summary),
                request.messages,
                conversation_id,
                self.index.as_deref(),
            )
            .await;
            if verdict == Validity::Valid {
                return self
                    .reuse_or_extend(
                        &request,
                        conversation_id,
                        summary.clone(),
                        threshold,
                        tokens_before,
                        store,
                    )
                    .await;
            }
            debug!(conversation = conversation_id, ?verdict, "stored summary rejected");
        }

        self.summarize_fresh(
            &request,
            conversation_id,
            existing.as_ref(),
            threshold,
            tokens_before,
            store,
        )
        .await
    }

    /// Wait for every summary write spawned so far.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = self.pending.lock().await.drain(..).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "summary write task panicked");
            }
        }
    }

    /// Newest-first greedy selection with no persisted state.
    fn trim(
        &self,
        request: &CompactionRequest<'_>,
        threshold: usize,
        tokens_before: usize,
    ) -> CompactionOutcome {
        if tokens_before <= threshold {
            return untouched(request, tokens_before);
        }

        let mut used = self.estimator.estimate(request.system_prompt, request.model);
        let mut kept: Vec<Message> = Vec::new();
        for message in request.messages.iter().rev() {
            let cost = self.estimator.estimate_message(message, request.model);
            // The newest message is always sent, even alone over budget.
            if used + cost > threshold && !kept.is_empty() {
                break;
            }
            used += cost;
            kept.push(message.clone());
        }
        kept.reverse();

        debug!(
            dropped = request.messages.len() - kept.len(),
            tokens_after = used,
            "trimmed conversation"
        );

        CompactionOutcome {
            final_messages: kept,
            summary: None,
            branch: CompactionBranch::Trimmed,
            tokens_before,
            tokens_after: used,
        }
    }

    async fn reuse_or_extend(
        &self,
        request: &CompactionRequest<'_>,
        conversation_id: &str,
        summary: ConversationSummary,
        threshold: usize,
        tokens_before: usize,
        store: Arc<dyn SummaryStore>,
    ) -> CompactionOutcome {
        let messages = request.messages;
        let tail = match validity::covered_index(&summary, messages) {
            Some(idx) => &messages[idx + 1..],
            None => messages,
        };

        let mut final_messages = Vec::with_capacity(tail.len() + 1);
        final_messages.push(summary_message(&summary.summary));
        final_messages.extend_from_slice(tail);
        let tokens_after =
            self.estimator
                .estimate_total(&final_messages, request.system_prompt, request.model);

        if tokens_after <= threshold || tail.len() <= self.policy.recent_window {
            debug!(
                conversation = conversation_id,
                tail = tail.len(),
                tokens_after,
                "reusing stored summary"
            );
            return CompactionOutcome {
                final_messages,
                summary: Some(summary.into_metadata(true)),
                branch: CompactionBranch::ReusedSummary,
                tokens_before,
                tokens_after,
            };
        }

        let (older, recent) = tail.split_at(tail.len() - self.policy.recent_window);
        let mut range = Vec::with_capacity(older.len() + 1);
        range.push(summary_context_message(&summary.summary));
        range.extend_from_slice(older);

        debug!(
            conversation = conversation_id,
            newly_covered = older.len(),
            "extending stored summary"
        );
        let text = self.generator.summarize(&range).await;

        let extended = ConversationSummary {
            summary: text,
            covered_until_message_id: older
                .last()
                .map(|m| m.id.clone())
                .unwrap_or_else(|| summary.covered_until_message_id.clone()),
            covered_until_sequence: summary.covered_until_sequence + older.len() as u64,
            created_at: Utc::now(),
        };

        self.shrink_and_persist(
            request,
            conversation_id,
            extended,
            recent,
            CompactionBranch::ExtendedSummary,
            threshold,
            tokens_before,
            store,
        )
        .await
    }

    async fn summarize_fresh(
        &self,
        request: &CompactionRequest<'_>,
        conversation_id: &str,
        previous: Option<&ConversationSummary>,
        threshold: usize,
        tokens_before: usize,
        store: Arc<dyn SummaryStore>,
    ) -> CompactionOutcome {
        let messages = request.messages;
        let recent_window = self.policy.recent_window;
        if messages.len() < recent_window + 1 {
            debug!(
                conversation = conversation_id,
                messages = messages.len(),
                "too few messages to summarize"
            );
            return untouched(request, tokens_before);
        }

        // Regeneration never moves the high-water mark backwards: everything
        // the previous summary covered is summarized again, so the covered id
        // and sequence keep naming the same message.
        let floor = previous.map_or(0, |p| {
            messages
                .iter()
                .enumerate()
                .filter(|(i, m)| {
                    m.sequence_number.unwrap_or(*i as u64 + 1) <= p.covered_until_sequence
                })
                .map(|(i, _)| i + 1)
                .last()
                .unwrap_or(0)
        });
        let split = (messages.len() - recent_window)
            .max(floor)
            .min(messages.len() - 1);

        let (older, recent) = messages.split_at(split);
        debug!(
            conversation = conversation_id,
            summarized = older.len(),
            "generating fresh summary"
        );
        let text = self.generator.summarize(older).await;

        let (covered_id, covered_sequence) = match older.last() {
            Some(last) => (
                last.id.clone(),
                last.sequence_number.unwrap_or(older.len() as u64),
            ),
            None => (String::new(), 0),
        };

        let fresh = ConversationSummary {
            summary: text,
            covered_until_message_id: covered_id,
            covered_until_sequence: covered_sequence,
            created_at: Utc::now(),
        };

        self.shrink_and_persist(
            request,
            conversation_id,
            fresh,
            recent,
            CompactionBranch::FreshSummary,
            threshold,
            tokens_before,
            store,
        )
        .await
    }

    /// Drop the oldest recent messages into the summary's coverage until the
    /// request fits or one message remains, then persist in the background.
    ///
    /// Moved messages are only accounted as covered; their text is not fed
    /// back to the summarizer.
    #[allow(clippy::too_many_arguments)]
    async fn shrink_and_persist(
        &self,
        request: &CompactionRequest<'_>,
        conversation_id: &str,
        mut covered: ConversationSummary,
        recent: &[Message],
        branch: CompactionBranch,
        threshold: usize,
        tokens_before: usize,
        store: Arc<dyn SummaryStore>,
    ) -> CompactionOutcome {
        let model = request.model;
        let head = summary_message(&covered.summary);
        let fixed = self.estimator.estimate(request.system_prompt, model)
            + self.estimator.estimate_message(&head, model);

        let mut recent = recent;
        let mut recent_tokens: usize = recent
            .iter()
            .map(|m| self.estimator.estimate_message(m, model))
            .sum();

        while fixed + recent_tokens > threshold && recent.len() > 1 {
            let moved = &recent[0];
            recent_tokens =
                recent_tokens.saturating_sub(self.estimator.estimate_message(moved, model));
            covered.covered_until_message_id = moved.id.clone();
            covered.covered_until_sequence += 1;
            recent = &recent[1..];
            debug!(
                conversation = conversation_id,
                moved = %moved.id,
                remaining = recent.len(),
                "shrinking recent window"
            );
        }

        let mut final_messages = Vec::with_capacity(recent.len() + 1);
        final_messages.push(head);
        final_messages.extend_from_slice(recent);

        self.persist(store, conversation_id, covered.clone()).await;

        CompactionOutcome {
            final_messages,
            summary: Some(covered.into_metadata(false)),
            branch,
            tokens_before,
            tokens_after: fixed + recent_tokens,
        }
    }

    async fn persist(
        &self,
        store: Arc<dyn SummaryStore>,
        conversation_id: &str,
        summary: ConversationSummary,
    ) {
        let conversation_id = conversation_id.to_string();
        let handle = tokio::spawn(async move {
            match store.set(&conversation_id, summary).await {
                Ok(()) => debug!(conversation = %conversation_id, "stored summary"),
                Err(e) => warn!(
                    conversation = %conversation_id,
                    error = %e,
                    "failed to store summary"
                ),
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

fn untouched(request: &CompactionRequest<'_>, tokens: usize) -> CompactionOutcome {
    CompactionOutcome {
        final_messages: request.messages.to_vec(),
        summary: None,
        branch: CompactionBranch::Untouched,
        tokens_before: tokens,
        tokens_after: tokens,
    }
}
