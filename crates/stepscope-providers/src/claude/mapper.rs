use crate::Result;
use serde_json::Value;
use stepscope_types::{
    parse_timestamp, ContentBlock, EntryKind, LogEntry, MessageContent, TokenUsage,
};

use super::schema::*;

/// Generate a deterministic id for records without an explicit uuid field
fn generate_record_id(kind: &str, timestamp: Option<&str>, line: usize) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    kind.hash(&mut hasher);
    timestamp.hash(&mut hasher);
    line.hash(&mut hasher);
    format!("gen-{:016x}", hasher.finish())
}

fn optional_timestamp(raw: Option<&str>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    raw.map(parse_timestamp).transpose().map_err(Into::into)
}

fn map_content(raw: RawContent) -> MessageContent {
    match raw {
        RawContent::Text(text) => MessageContent::Text(text),
        RawContent::Blocks(blocks) => {
            MessageContent::Blocks(blocks.into_iter().filter_map(map_block).collect())
        }
    }
}

fn map_block(raw: RawBlock) -> Option<ContentBlock> {
    match raw {
        RawBlock::Text { text } => Some(ContentBlock::Text { text }),
        RawBlock::Thinking { thinking } => Some(ContentBlock::Thinking { thinking }),
        RawBlock::ToolUse { id, name, input } => {
            Some(ContentBlock::ToolInvocation { id, name, input })
        }
        RawBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => Some(ContentBlock::ToolResult {
            invocation_id: tool_use_id,
            payload: content.unwrap_or(Value::Null),
            is_error: is_error.unwrap_or(false),
        }),
        RawBlock::Image { source } => Some(ContentBlock::Image { source }),
        // Redacted thinking, server tool blocks and future block types carry
        // nothing the reconstruction reads.
        RawBlock::Unknown => None,
    }
}

fn map_usage(raw: Option<RawUsage>) -> TokenUsage {
    let raw = raw.unwrap_or_default();
    TokenUsage::new(
        raw.input_tokens.unwrap_or(0),
        raw.output_tokens.unwrap_or(0),
        raw.cache_read_input_tokens.unwrap_or(0),
        raw.cache_creation_input_tokens.unwrap_or(0),
    )
}

/// Convert one raw record into a normalized entry.
///
/// Fails only when a field the entry cannot exist without is unusable,
/// e.g. an unparsable timestamp on a user or assistant record.
pub(crate) fn map_record(record: ClaudeRecord, line: usize) -> Result<LogEntry> {
    let entry = match record {
        ClaudeRecord::User(user) => {
            let timestamp = parse_timestamp(&user.timestamp)?;
            LogEntry {
                id: user.uuid.unwrap_or_else(|| {
                    generate_record_id("user", Some(&user.timestamp), line)
                }),
                parent_id: user.parent_uuid,
                timestamp: Some(timestamp),
                is_sidechain: user.is_sidechain,
                is_meta: user.is_meta,
                source_invocation_id: user.source_tool_use_id,
                agent_id: user.agent_id,
                usage: TokenUsage::ZERO,
                line,
                kind: EntryKind::User {
                    content: map_content(user.message.content),
                    spawned_agent_id: user.tool_use_result.and_then(|r| r.agent_id),
                },
            }
        }

        ClaudeRecord::Assistant(asst) => {
            let timestamp = parse_timestamp(&asst.timestamp)?;
            LogEntry {
                id: asst.uuid.unwrap_or_else(|| {
                    generate_record_id("assistant", Some(&asst.timestamp), line)
                }),
                parent_id: asst.parent_uuid,
                timestamp: Some(timestamp),
                is_sidechain: asst.is_sidechain,
                is_meta: asst.is_meta,
                source_invocation_id: None,
                agent_id: asst.agent_id,
                usage: map_usage(asst.message.usage),
                line,
                kind: EntryKind::Assistant {
                    content: map_content(asst.message.content),
                    model: asst.message.model,
                    request_id: asst.request_id,
                },
            }
        }

        ClaudeRecord::System(sys) => LogEntry {
            id: sys.uuid.unwrap_or_else(|| {
                generate_record_id("system", sys.timestamp.as_deref(), line)
            }),
            parent_id: sys.parent_uuid,
            timestamp: optional_timestamp(sys.timestamp.as_deref())?,
            is_sidechain: sys.is_sidechain,
            is_meta: sys.is_meta,
            source_invocation_id: None,
            agent_id: None,
            usage: TokenUsage::ZERO,
            line,
            kind: EntryKind::System {
                subtype: sys.subtype,
                text: sys.content,
            },
        },

        ClaudeRecord::Summary(summary) => LogEntry {
            id: generate_record_id("summary", None, line),
            parent_id: summary.leaf_uuid,
            timestamp: None,
            is_sidechain: false,
            is_meta: false,
            source_invocation_id: None,
            agent_id: None,
            usage: TokenUsage::ZERO,
            line,
            kind: EntryKind::Summary {
                summary: summary.summary,
            },
        },

        ClaudeRecord::FileHistorySnapshot(snap) => {
            let raw_ts = snap.snapshot.and_then(|s| s.timestamp);
            LogEntry {
                id: snap.message_id.unwrap_or_else(|| {
                    generate_record_id("snapshot", raw_ts.as_deref(), line)
                }),
                parent_id: None,
                // Snapshot timestamps are informational; a bad one is not worth the line.
                timestamp: raw_ts.as_deref().and_then(|ts| parse_timestamp(ts).ok()),
                is_sidechain: false,
                is_meta: false,
                source_invocation_id: None,
                agent_id: None,
                usage: TokenUsage::ZERO,
                line,
                kind: EntryKind::Snapshot,
            }
        }

        ClaudeRecord::QueueOperation(queue) => LogEntry {
            id: generate_record_id("queue-operation", queue.timestamp.as_deref(), line),
            parent_id: None,
            timestamp: optional_timestamp(queue.timestamp.as_deref())?,
            is_sidechain: false,
            is_meta: false,
            source_invocation_id: None,
            agent_id: None,
            usage: TokenUsage::ZERO,
            line,
            kind: EntryKind::QueueOperation {
                operation: queue.operation,
            },
        },
    };

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ClaudeRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_map_assistant_usage_and_blocks() {
        let rec = record(json!({
            "type": "assistant",
            "uuid": "a1",
            "timestamp": "2025-01-01T10:00:00Z",
            "message": {
                "model": "claude-sonnet",
                "content": [
                    {"type": "thinking", "thinking": "plan", "signature": "x"},
                    {"type": "tool_use", "id": "t1", "name": "Task", "input": {"description": "explore"}},
                    {"type": "server_tool_use", "id": "s1"}
                ],
                "usage": {
                    "input_tokens": 10,
                    "output_tokens": 5,
                    "cache_read_input_tokens": 100,
                    "cache_creation_input_tokens": 7
                }
            }
        }));

        let entry = map_record(rec, 3).unwrap();
        assert_eq!(entry.id, "a1");
        assert_eq!(entry.line, 3);
        assert_eq!(entry.usage, TokenUsage::new(10, 5, 100, 7));
        let blocks = entry.content().unwrap().blocks();
        assert_eq!(blocks.len(), 2, "unknown block types are dropped");
        assert!(matches!(&blocks[1], ContentBlock::ToolInvocation { id, .. } if id == "t1"));
    }

    #[test]
    fn test_map_user_tool_result_with_back_reference() {
        let rec = record(json!({
            "type": "user",
            "uuid": "u2",
            "timestamp": "2025-01-01T10:00:05Z",
            "sourceToolUseID": "t1",
            "toolUseResult": {"status": "completed", "agentId": "ab12"},
            "message": {
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": "t1", "content": "done"}]
            }
        }));

        let entry = map_record(rec, 1).unwrap();
        assert_eq!(entry.source_invocation_id.as_deref(), Some("t1"));
        assert_eq!(entry.spawned_agent_id(), Some("ab12"));
        assert!(entry.content().unwrap().has_tool_results());
    }

    #[test]
    fn test_tool_use_result_accepts_plain_string() {
        let rec = record(json!({
            "type": "user",
            "uuid": "u3",
            "timestamp": "2025-01-01T10:00:05Z",
            "toolUseResult": "Error: file not found",
            "message": {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "t9", "is_error": true}]}
        }));

        let entry = map_record(rec, 1).unwrap();
        assert_eq!(entry.spawned_agent_id(), None);
    }

    #[test]
    fn test_invalid_user_timestamp_is_an_error() {
        let rec = record(json!({
            "type": "user",
            "uuid": "u4",
            "timestamp": "not-a-time",
            "message": {"role": "user", "content": "hello"}
        }));

        assert!(map_record(rec, 1).is_err());
    }

    #[test]
    fn test_summary_has_no_timestamp_and_stable_id() {
        let first = map_record(record(json!({"type": "summary", "summary": "s"})), 1).unwrap();
        let again = map_record(record(json!({"type": "summary", "summary": "s"})), 1).unwrap();
        assert_eq!(first.timestamp, None);
        assert_eq!(first.id, again.id);
    }
}
