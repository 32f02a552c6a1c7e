use chrono::{DateTime, Utc};
use stepscope_types::{
    EntryCategory, ExecutionSegment, LogEntry, SegmentEntry, SegmentMetrics,
};
use uuid::Uuid;

use crate::classify::classify;
use crate::metrics::segment_metrics;

/// Namespace for segment ids (v5 of the trigger entry id).
const SEGMENT_NAMESPACE: Uuid = Uuid::from_u128(0x5e9a_7c1d_4b2f_4e8a_9c3d_1f0b_2a6e_7d41);

/// Segmentation output: segments plus what could not be placed in one.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub segments: Vec<ExecutionSegment>,
    /// Flow entries timestamped before the first trigger.
    pub unsegmented: Vec<LogEntry>,
}

struct SegmentBuilder {
    index: usize,
    start: DateTime<Utc>,
    trigger: LogEntry,
    flow: Vec<SegmentEntry>,
    sidechain: Vec<LogEntry>,
}

impl SegmentBuilder {
    fn new(index: usize, start: DateTime<Utc>, trigger: LogEntry) -> Self {
        Self {
            index,
            start,
            trigger,
            flow: Vec::new(),
            sidechain: Vec::new(),
        }
    }

    fn build(self, boundary_end: Option<DateTime<Utc>>) -> ExecutionSegment {
        let last_activity = self
            .flow
            .iter()
            .filter_map(|f| f.entry.timestamp)
            .fold(self.start, |acc, ts| acc.max(ts));

        let mut segment = ExecutionSegment {
            id: Uuid::new_v5(&SEGMENT_NAMESPACE, self.trigger.id.as_bytes()),
            index: self.index,
            start: self.start,
            boundary_end,
            last_activity,
            trigger: SegmentEntry {
                category: EntryCategory::Trigger,
                entry: self.trigger,
            },
            flow: self.flow,
            sidechain: self.sidechain,
            metrics: SegmentMetrics::default(),
            tool_executions: Vec::new(),
            subagent_ids: Vec::new(),
            steps: Vec::new(),
        };
        segment.metrics = segment_metrics(&segment);
        segment
    }
}

/// Group a session's entries into trigger-opened, time-bounded segments.
///
/// Sidechain entries are set aside per segment for diagnostics, noise is
/// dropped, and each Trigger opens `[trigger.ts, next_trigger.ts)`. Flow
/// entries land in the segment whose boundary holds their timestamp, in
/// arrival order. No triggers means no segments, which is not an error.
pub fn build_segments(entries: &[LogEntry]) -> Segmentation {
    let mut triggers: Vec<(DateTime<Utc>, &LogEntry)> = Vec::new();
    let mut flow: Vec<(DateTime<Utc>, EntryCategory, &LogEntry)> = Vec::new();
    let mut sidechain: Vec<(DateTime<Utc>, &LogEntry)> = Vec::new();

    for entry in entries {
        let Some(ts) = entry.timestamp else {
            tracing::trace!(id = %entry.id, "entry without timestamp left out of segmentation");
            continue;
        };

        if entry.is_sidechain {
            sidechain.push((ts, entry));
            continue;
        }

        match classify(entry) {
            EntryCategory::Noise => {}
            EntryCategory::Trigger => triggers.push((ts, entry)),
            category => flow.push((ts, category, entry)),
        }
    }

    // Stable: equal timestamps keep arrival order.
    triggers.sort_by_key(|(ts, _)| *ts);
    let starts: Vec<DateTime<Utc>> = triggers.iter().map(|(ts, _)| *ts).collect();

    let mut builders: Vec<SegmentBuilder> = triggers
        .iter()
        .enumerate()
        .map(|(index, (ts, entry))| SegmentBuilder::new(index, *ts, (*entry).clone()))
        .collect();

    let mut unsegmented = Vec::new();
    for (ts, category, entry) in flow {
        match owning_segment(&starts, ts) {
            Some(idx) => builders[idx].flow.push(SegmentEntry {
                category,
                entry: entry.clone(),
            }),
            None => unsegmented.push(entry.clone()),
        }
    }

    for (ts, entry) in sidechain {
        if let Some(idx) = owning_segment(&starts, ts) {
            builders[idx].sidechain.push(entry.clone());
        }
    }

    let segments: Vec<ExecutionSegment> = builders
        .into_iter()
        .enumerate()
        .map(|(idx, builder)| builder.build(starts.get(idx + 1).copied()))
        .collect();

    tracing::debug!(
        segments = segments.len(),
        unsegmented = unsegmented.len(),
        "segmentation complete"
    );

    Segmentation {
        segments,
        unsegmented,
    }
}

/// Index of the last segment starting at or before `ts`.
fn owning_segment(starts: &[DateTime<Utc>], ts: DateTime<Utc>) -> Option<usize> {
    starts.partition_point(|start| *start <= ts).checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use stepscope_types::{EntryKind, MessageContent, TokenUsage};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn entry(id: &str, secs: i64, kind: EntryKind) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            parent_id: None,
            timestamp: Some(at(secs)),
            is_sidechain: false,
            is_meta: false,
            source_invocation_id: None,
            agent_id: None,
            usage: TokenUsage::ZERO,
            line: 0,
            kind,
        }
    }

    fn user(id: &str, secs: i64, text: &str) -> LogEntry {
        entry(
            id,
            secs,
            EntryKind::User {
                content: MessageContent::Text(text.to_string()),
                spawned_agent_id: None,
            },
        )
    }

    fn assistant(id: &str, secs: i64) -> LogEntry {
        entry(
            id,
            secs,
            EntryKind::Assistant {
                content: MessageContent::Text("ok".to_string()),
                model: None,
                request_id: None,
            },
        )
    }

    fn ids(segment: &ExecutionSegment) -> Vec<&str> {
        segment.entries().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_no_triggers_no_segments() {
        let entries = vec![
            entry("s", 0, EntryKind::Summary { summary: "x".to_string() }),
            user("c", 1, "<local-command-stdout>hi</local-command-stdout>"),
        ];
        let result = build_segments(&entries);
        assert!(result.segments.is_empty());
        assert_eq!(result.unsegmented.len(), 1);
    }

    #[test]
    fn test_boundaries_are_contiguous() {
        let entries = vec![
            user("u1", 0, "first"),
            assistant("a1", 1),
            user("u2", 5, "second"),
            assistant("a2", 6),
            assistant("a3", 9),
        ];
        let result = build_segments(&entries);

        assert_eq!(result.segments.len(), 2);
        let (s0, s1) = (&result.segments[0], &result.segments[1]);
        assert_eq!(ids(s0), vec!["u1", "a1"]);
        assert_eq!(ids(s1), vec!["u2", "a2", "a3"]);
        assert_eq!(s0.boundary_end, Some(s1.start));
        assert_eq!(s1.boundary_end, None);
        assert_eq!(s1.metrics.duration_ms, 4000);
    }

    #[test]
    fn test_back_to_back_triggers_give_empty_segment() {
        let entries = vec![user("u1", 0, "one"), user("u2", 0, "two"), assistant("a", 1)];
        let result = build_segments(&entries);

        assert_eq!(result.segments.len(), 2);
        assert!(result.segments[0].flow.is_empty());
        assert_eq!(result.segments[0].metrics.duration_ms, 0);
        assert_eq!(ids(&result.segments[1]), vec!["u2", "a"]);
    }

    #[test]
    fn test_sidechain_kept_separately() {
        let mut side = assistant("side", 2);
        side.is_sidechain = true;
        let entries = vec![user("u1", 0, "go"), side, assistant("a1", 3)];
        let result = build_segments(&entries);

        assert_eq!(ids(&result.segments[0]), vec!["u1", "a1"]);
        assert_eq!(result.segments[0].sidechain.len(), 1);
    }

    #[test]
    fn test_segment_ids_are_deterministic() {
        let entries = vec![user("u1", 0, "go"), assistant("a1", 1)];
        let first = build_segments(&entries);
        let second = build_segments(&entries);
        assert_eq!(first.segments[0].id, second.segments[0].id);
    }
}
