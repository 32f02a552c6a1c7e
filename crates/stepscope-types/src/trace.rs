use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{LogEntry, TokenUsage};

/// The four categories every entry falls into. Closed on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    /// Genuine user input; opens a segment.
    Trigger,
    /// Part of a response (assistant output, tool results, interruptions).
    Flow,
    /// Bookkeeping records that never reach a segment.
    Noise,
    /// System-generated local command output, rendered like a response.
    CommandOutput,
}

impl EntryCategory {
    /// CommandOutput is a Flow subtype for segmentation purposes.
    pub fn is_flow(&self) -> bool {
        matches!(self, EntryCategory::Flow | EntryCategory::CommandOutput)
    }
}

// ==========================================
// 1. Segment (trigger + its response flow)
// ==========================================

/// An entry placed in a segment, tagged with the role it plays there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub category: EntryCategory,
    pub entry: LogEntry,
}

/// One Trigger entry and the Flow entries inside its time boundary.
///
/// The boundary is `[start, boundary_end)`; `boundary_end` is the next
/// trigger's timestamp and `None` for the final segment. Built once from the
/// entry stream, then annotated (never restructured) with tool executions,
/// subagent links and steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSegment {
    /// Derived from the trigger entry id, stable across runs.
    pub id: Uuid,
    pub index: usize,
    pub start: DateTime<Utc>,
    pub boundary_end: Option<DateTime<Utc>>,
    /// Timestamp of the latest entry placed in this segment.
    pub last_activity: DateTime<Utc>,
    pub trigger: SegmentEntry,
    pub flow: Vec<SegmentEntry>,
    /// Sidechain entries in the same time range. Diagnostic only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidechain: Vec<LogEntry>,
    pub metrics: SegmentMetrics,
    #[serde(default)]
    pub tool_executions: Vec<ToolExecution>,
    #[serde(default)]
    pub subagent_ids: Vec<String>,
    #[serde(default)]
    pub steps: Vec<SemanticStep>,
}

impl ExecutionSegment {
    /// Trigger followed by flow entries, in arrival order.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        std::iter::once(&self.trigger.entry).chain(self.flow.iter().map(|f| &f.entry))
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && self.boundary_end.is_none_or(|end| ts < end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    /// Trigger plus flow entries.
    pub message_count: usize,
    pub tool_call_count: usize,
    pub duration_ms: i64,
    pub tokens: TokenUsage,
}

// ==========================================
// 2. Tool execution (invocation + result)
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    /// No result observed: in flight, or asynchronous work.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub invocation_id: String,
    pub name: String,
    pub input: Value,
    /// Entry that carried the invocation block.
    pub entry_id: String,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResultRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl ToolExecution {
    pub fn status(&self) -> ToolStatus {
        match &self.result {
            None => ToolStatus::Pending,
            Some(r) if r.is_error => ToolStatus::Error,
            Some(_) => ToolStatus::Success,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.result.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_agent_id: Option<String>,
}

// ==========================================
// 3. Subagent process
// ==========================================

/// An independently logged sub-execution and the invocation that spawned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentProcess {
    pub id: String,
    pub source: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<LogEntry>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
    pub metrics: ProcessMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    #[serde(default)]
    pub is_parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub steps: Vec<SemanticStep>,
}

impl SubagentProcess {
    pub fn is_linked(&self) -> bool {
        self.invocation_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub message_count: usize,
    pub tool_call_count: usize,
    pub tokens: TokenUsage,
}

/// Parsed contents of one independently stored process file, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessLog {
    pub process_id: String,
    pub source: PathBuf,
    pub entries: Vec<LogEntry>,
}

/// Processes whose start times fall within one window of a shared anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelGroup {
    pub id: String,
    pub anchor_start: DateTime<Utc>,
    pub members: Vec<String>,
}

impl ParallelGroup {
    pub fn is_parallel(&self) -> bool {
        self.members.len() >= 2
    }
}

// ==========================================
// 4. Semantic step
// ==========================================

/// Which step sequence a step belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum StepScope {
    Main,
    Subagent { process_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrigin {
    Assistant,
    CommandOutput,
}

/// Type-specific step payload. Six kinds, no more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Thinking {
        text: String,
    },
    ToolCall {
        invocation_id: String,
        name: String,
        input: Value,
        status: ToolStatus,
    },
    ToolResult {
        invocation_id: String,
        payload: Value,
        is_error: bool,
    },
    Subagent {
        process_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        invocation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        message_count: usize,
    },
    Output {
        text: String,
        origin: OutputOrigin,
    },
    Interruption {
        text: String,
    },
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Thinking { .. } => "thinking",
            StepKind::ToolCall { .. } => "tool_call",
            StepKind::ToolResult { .. } => "tool_result",
            StepKind::Subagent { .. } => "subagent",
            StepKind::Output { .. } => "output",
            StepKind::Interruption { .. } => "interruption",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticStep {
    pub id: String,
    pub scope: StepScope,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entry_id: Option<String>,
    /// Usage of the originating entry, attributed to its first step only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<String>,
    #[serde(default)]
    pub accumulated_context: u64,
}

impl SemanticStep {
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn context_tokens(&self) -> u64 {
        self.tokens.map(|t| t.context_tokens()).unwrap_or(0)
    }
}

// ==========================================
// 5. Session-level output
// ==========================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub segment_count: usize,
    /// User and assistant entries on the primary thread.
    pub message_count: usize,
    pub tool_call_count: usize,
    pub subagent_count: usize,
    pub parallel_subagent_count: usize,
    pub duration_ms: i64,
    pub tokens: TokenUsage,
    pub subagent_tokens: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

/// Outcome of reading one log file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub lines_read: usize,
    pub entries_parsed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OmitReason {
    Unreadable,
    /// No entry with a timestamp, so no span can be computed.
    Empty,
    /// Warm-up probe process that must never surface.
    WarmupSentinel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedProcess {
    pub process_id: String,
    pub source: PathBuf,
    pub reason: OmitReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Full reconstruction result for one session.
///
/// Zero segments is a valid "empty session", distinct from a parse failure
/// (which never reaches this type).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTrace {
    pub segments: Vec<ExecutionSegment>,
    pub tool_executions: Vec<ToolExecution>,
    pub subagents: Vec<SubagentProcess>,
    pub parallel_groups: Vec<ParallelGroup>,
    /// Segment steps with each subagent step followed by its nested steps.
    pub timeline: Vec<SemanticStep>,
    pub metrics: SessionMetrics,
    #[serde(default)]
    pub parse_report: ParseReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted_processes: Vec<OmittedProcess>,
    /// Flow entries that arrived before the first trigger.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsegmented: Vec<LogEntry>,
}

impl SessionTrace {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn subagent(&self, id: &str) -> Option<&SubagentProcess> {
        self.subagents.iter().find(|p| p.id == id)
    }
}
