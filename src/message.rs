//! Message types for conversations handed to the compaction engine.
//!
//! Provides a structured [`Message`] with a [`Role`], plain or multi-part
//! [`Content`], attachment references, and the edit/sequence metadata the
//! engine needs to decide whether a persisted summary is still trustworthy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single message in a conversation.
///
/// `sequence_number` is assigned by the durable message source and is
/// strictly increasing within a conversation. Messages built in memory (or
/// synthetic ones such as the summary message) may not carry one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// Raw tool outputs keyed by tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Map<String, Value>>,
    /// Provider-reported usage for this turn, preferred over estimation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Precomputed token count supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
}

/// The role of a message sender in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message body: either a plain string or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<Part>),
}

/// One element of a multi-part message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text {
        text: String,
    },
    ToolResult {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default)]
        result: Value,
    },
    Image {
        #[serde(default, rename = "mediaType")]
        media_type: Option<String>,
    },
    File {
        #[serde(default)]
        filename: Option<String>,
        #[serde(default, rename = "mediaType")]
        media_type: Option<String>,
    },
    /// Any part kind this engine does not model.
    #[serde(other)]
    Unknown,
}

/// A file or image attached to a message by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Coarse kind reported by the uploader (`image`, `pdf`, `code`, ...).
    #[serde(default)]
    pub file_type: Option<String>,
    /// Token cost measured at upload time; wins over any heuristic.
    #[serde(default)]
    pub estimated_tokens: Option<usize>,
}

/// Usage reported by the provider that generated a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    #[serde(alias = "totalTokens")]
    pub total_tokens: usize,
}

impl Message {
    fn with_role(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: Content::Text(text.into()),
            attachments: Vec::new(),
            sequence_number: None,
            is_edited: false,
            edited_at: None,
            tool_results: None,
            token_usage: None,
            token_count: None,
        }
    }

    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_role(id, Role::User, text)
    }

    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_role(id, Role::Assistant, text)
    }

    pub fn system(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_role(id, Role::System, text)
    }

    /// Sets the durable sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence_number = Some(sequence);
        self
    }

    /// Marks the message as edited at `at`.
    #[cfg(test)]
    pub fn edited(mut self, at: DateTime<Utc>) -> Self {
        self.is_edited = true;
        self.edited_at = Some(at);
        self
    }

    /// Concatenated text of the message body, ignoring non-text parts.
    pub fn text(&self) -> String {
        match &self.content {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Part::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Provider-reported token usage, from the message or its tool results.
    pub fn reported_usage(&self) -> Option<usize> {
        if let Some(usage) = self.token_usage {
            if usage.total_tokens > 0 {
                return Some(usage.total_tokens);
            }
        }
        self.tool_results
            .as_ref()?
            .get(crate::constants::TOKEN_USAGE_KEY)?
            .get("totalTokens")?
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
    }

    /// Whether this message was edited strictly after `instant`.
    pub fn edited_after(&self, instant: DateTime<Utc>) -> bool {
        self.is_edited && self.edited_at.is_some_and(|at| at > instant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_plain_text_message() {
        let msg: Message = serde_json::from_str(
            r#"{"id":"m1","role":"user","content":"hello","sequence_number":3}"#,
        )
        .unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.sequence_number, Some(3));
        assert!(!msg.is_edited);
    }

    #[test]
    fn test_parse_parts_message_with_unknown_kind() {
        let msg: Message = serde_json::from_str(
            r#"{"id":"m2","role":"assistant","content":[
                {"type":"text","text":"see chart"},
                {"type":"tool-result","toolName":"search","result":{"hits":2}},
                {"type":"reasoning","text":"hidden"}
            ]}"#,
        )
        .unwrap();
        let Content::Parts(parts) = &msg.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], Part::Unknown);
        assert_eq!(msg.text(), "see chart");
    }

    #[test]
    fn test_reported_usage_prefers_message_field() {
        let mut msg = Message::assistant("m1", "hi");
        msg.token_usage = Some(TokenUsage { total_tokens: 42 });
        assert_eq!(msg.reported_usage(), Some(42));
    }

    #[test]
    fn test_reported_usage_from_tool_results() {
        let mut msg = Message::assistant("m1", "hi");
        let mut results = Map::new();
        results.insert(
            "token_usage".to_string(),
            serde_json::json!({"totalTokens": 77}),
        );
        msg.tool_results = Some(results);
        assert_eq!(msg.reported_usage(), Some(77));
    }

    #[test]
    fn test_edited_after() {
        let t0 = Utc::now();
        let msg = Message::user("m1", "hi").edited(t0 + Duration::minutes(5));
        assert!(msg.edited_after(t0));
        assert!(!msg.edited_after(t0 + Duration::minutes(10)));
        assert!(!Message::user("m2", "hi").edited_after(t0));
    }
}
