//! Semantic step extraction: map entries (and resolved processes) onto the
//! six step kinds of a normalized timeline.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use stepscope_types::{
    ContentBlock, EntryCategory, EntryKind, ExecutionSegment, LogEntry,
    OutputOrigin, SemanticStep, StepKind, StepScope, SubagentProcess, ToolExecution, ToolStatus,
};

use crate::classify::{classify, is_interruption};
use crate::config::EngineConfig;
use crate::linkage::link_tool_executions;

/// Shared state for extracting one step sequence.
pub struct StepExtractor<'a> {
    scope: StepScope,
    config: &'a EngineConfig,
    executions: HashMap<&'a str, &'a ToolExecution>,
    /// Spawn invocations already represented by a resolved process.
    satisfied: &'a HashSet<String>,
}

impl<'a> StepExtractor<'a> {
    pub fn new(
        scope: StepScope,
        config: &'a EngineConfig,
        executions: &'a [ToolExecution],
        satisfied: &'a HashSet<String>,
    ) -> Self {
        Self {
            scope,
            config,
            executions: executions
                .iter()
                .map(|e| (e.invocation_id.as_str(), e))
                .collect(),
            satisfied,
        }
    }

    fn scope_key(&self) -> &str {
        match &self.scope {
            StepScope::Main => "main",
            StepScope::Subagent { process_id } => process_id,
        }
    }

    fn step(&self, entry: &LogEntry, ts: DateTime<Utc>, idx: usize, kind: StepKind) -> SemanticStep {
        SemanticStep {
            id: format!("{}:{}:{}", self.scope_key(), entry.id, idx),
            scope: self.scope.clone(),
            start: ts,
            end: None,
            duration_ms: 0,
            kind,
            source_entry_id: Some(entry.id.clone()),
            tokens: None,
            parallel_group: None,
            accumulated_context: 0,
        }
    }

    /// Steps produced by one entry. Triggers produce none.
    ///
    /// The entry's usage is attributed to its first step only.
    pub fn entry_steps(&self, category: EntryCategory, entry: &LogEntry) -> Vec<SemanticStep> {
        let Some(ts) = entry.timestamp else {
            return Vec::new();
        };

        let mut steps = match (&entry.kind, category) {
            (_, EntryCategory::Noise) => Vec::new(),
            (EntryKind::User { content, .. }, EntryCategory::CommandOutput) => {
                vec![self.step(
                    entry,
                    ts,
                    0,
                    StepKind::Output {
                        text: content.joined_text(),
                        origin: OutputOrigin::CommandOutput,
                    },
                )]
            }
            (EntryKind::User { content, .. }, _) if is_interruption(content) => {
                vec![self.step(
                    entry,
                    ts,
                    0,
                    StepKind::Interruption {
                        text: content.joined_text(),
                    },
                )]
            }
            (EntryKind::User { content, .. }, _) => content
                .blocks()
                .iter()
                .enumerate()
                .filter_map(|(idx, block)| match block {
                    ContentBlock::ToolResult {
                        invocation_id,
                        payload,
                        is_error,
                    } => Some(self.step(
                        entry,
                        ts,
                        idx,
                        StepKind::ToolResult {
                            invocation_id: invocation_id.clone(),
                            payload: payload.clone(),
                            is_error: *is_error,
                        },
                    )),
                    _ => None,
                })
                .collect(),
            (EntryKind::Assistant { content, .. }, _) => content
                .blocks()
                .iter()
                .enumerate()
                .filter_map(|(idx, block)| self.assistant_block(entry, ts, idx, block))
                .chain(
                    content
                        .sole_text()
                        .filter(|_| content.blocks().is_empty())
                        .filter(|text| !text.trim().is_empty())
                        .map(|text| {
                            self.step(
                                entry,
                                ts,
                                0,
                                StepKind::Output {
                                    text: text.to_string(),
                                    origin: OutputOrigin::Assistant,
                                },
                            )
                        }),
                )
                .collect(),
            _ => Vec::new(),
        };

        if let Some(first) = steps.first_mut() {
            first.tokens = Some(entry.usage);
        }
        steps
    }

    fn assistant_block(
        &self,
        entry: &LogEntry,
        ts: DateTime<Utc>,
        idx: usize,
        block: &ContentBlock,
    ) -> Option<SemanticStep> {
        match block {
            ContentBlock::Thinking { thinking } => Some(self.step(
                entry,
                ts,
                idx,
                StepKind::Thinking {
                    text: thinking.clone(),
                },
            )),
            ContentBlock::Text { text } if !text.trim().is_empty() => Some(self.step(
                entry,
                ts,
                idx,
                StepKind::Output {
                    text: text.clone(),
                    origin: OutputOrigin::Assistant,
                },
            )),
            ContentBlock::ToolInvocation { id, name, input } => {
                if self.config.is_spawn_tool(name) && self.satisfied.contains(id) {
                    return None;
                }
                let execution = self.executions.get(id.as_str());
                let mut step = self.step(
                    entry,
                    ts,
                    idx,
                    StepKind::ToolCall {
                        invocation_id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                        status: execution.map(|e| e.status()).unwrap_or(ToolStatus::Pending),
                    },
                );
                if let Some(exec) = execution {
                    step.end = exec.end;
                    step.duration_ms = exec.duration_ms.unwrap_or(0);
                }
                Some(step)
            }
            _ => None,
        }
    }

    /// The step standing in for a resolved process.
    pub fn subagent_step(&self, process: &SubagentProcess) -> SemanticStep {
        SemanticStep {
            id: format!("{}:subagent:{}", self.scope_key(), process.id),
            scope: self.scope.clone(),
            start: process.start,
            end: Some(process.end),
            duration_ms: process.duration_ms,
            kind: StepKind::Subagent {
                process_id: process.id.clone(),
                invocation_id: process.invocation_id.clone(),
                description: process.description.clone(),
                role: process.role.clone(),
                message_count: process.metrics.message_count,
            },
            source_entry_id: None,
            tokens: None,
            parallel_group: process.group_id.clone(),
            accumulated_context: 0,
        }
    }
}

/// Stable sort by start; equal starts keep extraction order.
fn sort_steps(steps: &mut [SemanticStep]) {
    steps.sort_by_key(|s| s.start);
}

/// Steps for one segment, including one `subagent` step per process
/// assigned to it (orphans too).
///
/// `satisfied` holds every invocation id some resolved process links to;
/// spawn invocations in it are represented by the process, not a tool call.
pub fn segment_steps(
    segment: &ExecutionSegment,
    processes: &[&SubagentProcess],
    satisfied: &HashSet<String>,
    config: &EngineConfig,
) -> Vec<SemanticStep> {
    let extractor = StepExtractor::new(StepScope::Main, config, &segment.tool_executions, satisfied);

    let mut steps: Vec<SemanticStep> = std::iter::once(&segment.trigger)
        .chain(segment.flow.iter())
        .flat_map(|se| extractor.entry_steps(se.category, &se.entry))
        .collect();

    steps.extend(processes.iter().map(|p| extractor.subagent_step(p)));
    sort_steps(&mut steps);
    steps
}

/// Nested steps of one process, tagged with its own scope.
///
/// The sidechain flag means nothing inside a process file; every non-noise,
/// non-trigger entry is flow.
pub fn process_steps(process: &SubagentProcess, config: &EngineConfig) -> Vec<SemanticStep> {
    let executions = link_tool_executions(&process.entries);
    let none = HashSet::new();
    let extractor = StepExtractor::new(
        StepScope::Subagent {
            process_id: process.id.clone(),
        },
        config,
        &executions,
        &none,
    );

    let mut steps: Vec<SemanticStep> = process
        .entries
        .iter()
        .flat_map(|entry| extractor.entry_steps(classify(entry), entry))
        .collect();
    sort_steps(&mut steps);
    steps
}
