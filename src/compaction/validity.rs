//! Decides whether a persisted summary can still stand in for old history.
//!
//! A stored summary is only worth reusing if the messages it claims to
//! cover are still the messages the client has. Two things break that:
//! an edit inside the covered range after the summary was written, and a
//! client whose first supplied message sits inside the covered range even
//! though the covered message itself is missing (history rewritten beneath
//! the summary).

use tracing::debug;

use super::summary::ConversationSummary;
use crate::message::Message;
use crate::store::MessageIndex;

/// Verdict on a stored summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    /// No summary, or one without text or a high-water mark.
    NotCandidate,
    /// A covered message was edited after the summary was written.
    EditedInRange,
    /// The supplied history starts inside the covered range.
    StaleFoundation,
}

/// Structural check only: the summary exists and is usable in principle.
pub fn is_valid(summary: Option<&ConversationSummary>, _messages: &[Message]) -> bool {
    summary.is_some_and(ConversationSummary::is_candidate)
}

/// Position of the covered message in `messages`, if the client sent it.
pub fn covered_index(summary: &ConversationSummary, messages: &[Message]) -> Option<usize> {
    messages
        .iter()
        .position(|m| m.id == summary.covered_until_message_id)
}

/// Whether any covered message still present was edited after the summary.
pub fn edited_in_range(summary: &ConversationSummary, messages: &[Message]) -> bool {
    messages
        .iter()
        .filter(|m| {
            m.id == summary.covered_until_message_id
                || m.sequence_number
                    .is_some_and(|seq| seq <= summary.covered_until_sequence)
        })
        .any(|m| m.edited_after(summary.created_at))
}

/// Whether the supplied history starts inside the covered range.
///
/// Only meaningful when the covered message is absent. The durable index is
/// authoritative; a message it does not know is new, so the summary stands.
/// If the index cannot be reached, the sequence numbers the client sent are
/// used instead.
pub async fn stale_foundation(
    summary: &ConversationSummary,
    messages: &[Message],
    conversation_id: &str,
    index: Option<&dyn MessageIndex>,
) -> bool {
    let Some(first) = messages.first() else {
        return false;
    };

    if let Some(index) = index {
        match index.sequence_number(&first.id, conversation_id).await {
            Ok(Some(seq)) => return seq > 0 && seq <= summary.covered_until_sequence,
            Ok(None) => return false,
            Err(e) => {
                debug!(error = %e, "sequence lookup failed, using client sequence numbers");
            }
        }
    }

    messages.iter().any(|m| {
        m.sequence_number
            .is_some_and(|seq| seq > 0 && seq <= summary.covered_until_sequence)
    })
}

/// Full verdict combining the structural, edit, and foundation checks.
pub async fn check(
    summary: Option<&ConversationSummary>,
    messages: &[Message],
    conversation_id: &str,
    index: Option<&dyn MessageIndex>,
) -> Validity {
    let Some(summary) = summary.filter(|_| is_valid(summary, messages)) else {
        return Validity::NotCandidate;
    };

    if covered_index(summary, messages).is_none()
        && stale_foundation(summary, messages, conversation_id, index).await
    {
        return Validity::StaleFoundation;
    }

    if edited_in_range(summary, messages) {
        return Validity::EditedInRange;
    }

    Validity::Valid
}
