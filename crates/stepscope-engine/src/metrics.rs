//! Exact linear aggregation of entry counters.
//!
//! Consumers compare these totals for equality, so everything here is plain
//! integer summation in a fixed order-independent form. Token sums saturate
//! at `u64::MAX`.

use stepscope_types::{
    span_ms, ContentBlock, ExecutionSegment, LogEntry, ProcessMetrics, SegmentMetrics,
    SessionMetrics, SubagentProcess, TokenUsage,
};

pub fn invocation_count(entry: &LogEntry) -> usize {
    entry
        .content()
        .map(|c| {
            c.blocks()
                .iter()
                .filter(|b| matches!(b, ContentBlock::ToolInvocation { .. }))
                .count()
        })
        .unwrap_or(0)
}

pub fn sum_usage<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> TokenUsage {
    entries.into_iter().map(|e| e.usage).sum()
}

pub fn segment_metrics(segment: &ExecutionSegment) -> SegmentMetrics {
    SegmentMetrics {
        message_count: 1 + segment.flow.len(),
        tool_call_count: segment.entries().map(invocation_count).sum(),
        duration_ms: span_ms(segment.start, segment.last_activity),
        tokens: sum_usage(segment.entries()),
    }
}

pub fn process_metrics(entries: &[LogEntry]) -> ProcessMetrics {
    ProcessMetrics {
        message_count: entries
            .iter()
            .filter(|e| e.is_user() || e.is_assistant())
            .count(),
        tool_call_count: entries.iter().map(invocation_count).sum(),
        tokens: sum_usage(entries),
    }
}

/// Session totals over the primary thread plus resolved processes.
///
/// `primary` is every non-sidechain entry of the session log; noise entries
/// carry zero usage and are not user/assistant, so they contribute nothing.
pub fn session_metrics(
    primary: &[&LogEntry],
    segments: &[ExecutionSegment],
    subagents: &[SubagentProcess],
) -> SessionMetrics {
    let timestamps = primary.iter().filter_map(|e| e.timestamp);
    let first = timestamps.clone().min();
    let last = timestamps.max();

    SessionMetrics {
        segment_count: segments.len(),
        message_count: primary
            .iter()
            .filter(|e| e.is_user() || e.is_assistant())
            .count(),
        tool_call_count: primary.iter().map(|e| invocation_count(e)).sum(),
        subagent_count: subagents.len(),
        parallel_subagent_count: subagents.iter().filter(|p| p.is_parallel).count(),
        duration_ms: match (first, last) {
            (Some(first), Some(last)) => span_ms(first, last),
            _ => 0,
        },
        tokens: primary.iter().map(|e| e.usage).sum(),
        subagent_tokens: subagents.iter().map(|p| p.metrics.tokens).sum(),
    }
}
