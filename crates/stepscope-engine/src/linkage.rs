use std::collections::HashMap;

use stepscope_types::{span_ms, ContentBlock, LogEntry, ToolExecution, ToolResultRecord};

/// Pair tool invocations with their results among one scope's entries.
///
/// A result's id is the entry's explicit back-reference when the entry
/// carries a single result (or the block has no id of its own), otherwise
/// the id inside the result block. Pairing ignores which of the
/// two arrives first. The earliest-arriving result for an id wins and later
/// duplicates are dropped. Unmatched invocations stay pending.
///
/// Output is ordered by invocation start (stable on ties).
pub fn link_tool_executions<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
) -> Vec<ToolExecution> {
    let mut executions: Vec<ToolExecution> = Vec::new();
    let mut results: HashMap<String, ToolResultRecord> = HashMap::new();

    for entry in entries {
        let (Some(ts), Some(content)) = (entry.timestamp, entry.content()) else {
            continue;
        };

        let result_blocks = content
            .blocks()
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolResult { .. }))
            .count();

        for block in content.blocks() {
            match block {
                ContentBlock::ToolInvocation { id, name, input } if entry.is_assistant() => {
                    executions.push(ToolExecution {
                        invocation_id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                        entry_id: entry.id.clone(),
                        start: ts,
                        result: None,
                        end: None,
                        duration_ms: None,
                    });
                }
                ContentBlock::ToolResult {
                    invocation_id,
                    payload,
                    is_error,
                } => {
                    let key = result_key(entry, invocation_id, result_blocks).to_string();

                    if results.contains_key(&key) {
                        tracing::trace!(invocation = %key, entry = %entry.id, "duplicate tool result dropped");
                        continue;
                    }

                    results.insert(
                        key,
                        ToolResultRecord {
                            entry_id: entry.id.clone(),
                            timestamp: ts,
                            payload: payload.clone(),
                            is_error: *is_error,
                            spawned_agent_id: entry.spawned_agent_id().map(String::from),
                        },
                    );
                }
                _ => {}
            }
        }
    }

    for execution in &mut executions {
        if let Some(result) = results.get(&execution.invocation_id) {
            execution.end = Some(result.timestamp);
            execution.duration_ms = Some(span_ms(execution.start, result.timestamp));
            execution.result = Some(result.clone());
        }
    }

    executions.sort_by_key(|e| e.start);
    executions
}

/// An entry-level back-reference names one invocation, so it only stands in
/// for a block id when it cannot be mistaken for a sibling's.
fn result_key<'a>(entry: &'a LogEntry, block_id: &'a str, result_blocks: usize) -> &'a str {
    match entry.source_invocation_id.as_deref() {
        Some(back_ref) if result_blocks == 1 || block_id.is_empty() => back_ref,
        _ => block_id,
    }
}
