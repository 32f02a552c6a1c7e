use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TokenUsage;

// ==========================================
// 1. Log entry (one line of the session log)
// ==========================================

/// One record from a session log, normalized from the provider schema.
///
/// Entries are created once at parse time and never mutated afterwards.
/// Every consumer downstream (classifier, segmenter, resolvers) treats them
/// as read-only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Identity of the record (`uuid` in the source log, or a derived id).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Absent only for record types that never carry one (e.g. summaries).
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Entry belongs to a nested thread rather than the primary one.
    #[serde(default)]
    pub is_sidechain: bool,
    #[serde(default)]
    pub is_meta: bool,
    /// Explicit back-reference to the tool invocation that produced this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_invocation_id: Option<String>,
    /// Agent that wrote this entry (set inside subagent process files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub usage: TokenUsage,
    /// 1-based line number in the source file.
    #[serde(default)]
    pub line: usize,
    pub kind: EntryKind,
}

impl LogEntry {
    pub fn content(&self) -> Option<&MessageContent> {
        match &self.kind {
            EntryKind::User { content, .. } | EntryKind::Assistant { content, .. } => {
                Some(content)
            }
            EntryKind::System { .. }
            | EntryKind::Summary { .. }
            | EntryKind::Snapshot
            | EntryKind::QueueOperation { .. } => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self.kind, EntryKind::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self.kind, EntryKind::Assistant { .. })
    }

    /// Agent id announced by a spawn result (`toolUseResult.agentId`).
    pub fn spawned_agent_id(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::User {
                spawned_agent_id, ..
            } => spawned_agent_id.as_deref(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Record type discriminator with the per-type payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    User {
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spawned_agent_id: Option<String>,
    },
    Assistant {
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    System {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Summary {
        summary: String,
    },
    Snapshot,
    QueueOperation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },
}

impl EntryKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::User { .. } => "user",
            EntryKind::Assistant { .. } => "assistant",
            EntryKind::System { .. } => "system",
            EntryKind::Summary { .. } => "summary",
            EntryKind::Snapshot => "snapshot",
            EntryKind::QueueOperation { .. } => "queue_operation",
        }
    }
}

// ==========================================
// 2. Message content
// ==========================================

/// User/assistant content: either a bare string or an ordered block list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    /// The single piece of text this content consists of, if it is exactly one.
    ///
    /// A bare string, or a block list holding one text block and nothing else.
    pub fn sole_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(blocks) => match blocks.as_slice() {
                [ContentBlock::Text { text }] => Some(text),
                _ => None,
            },
        }
    }

    /// All text carried by the content, text blocks joined with newlines.
    pub fn joined_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// True when the content carries something a human typed or attached.
    pub fn has_user_payload(&self) -> bool {
        match self {
            MessageContent::Text(text) => !text.trim().is_empty(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .any(|b| matches!(b, ContentBlock::Text { .. } | ContentBlock::Image { .. })),
        }
    }

    pub fn has_tool_results(&self) -> bool {
        self.blocks()
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

/// A single typed block inside message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolInvocation {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        invocation_id: String,
        #[serde(default)]
        payload: Value,
        #[serde(default)]
        is_error: bool,
    },
    Image {
        #[serde(default)]
        source: Value,
    },
}

/// Flatten a tool-result payload to display text.
///
/// Payloads are either a string or a list of `{type: "text", text}` blocks;
/// anything else falls back to its JSON rendering.
pub fn payload_text(payload: &Value) -> String {
    match payload {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map.get("text").and_then(|t| t.as_str()).map(String::from),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}
