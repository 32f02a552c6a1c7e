use std::collections::{HashMap, HashSet};

use stepscope_types::{
    ExecutionSegment, LogEntry, OmittedProcess, ParseReport, ProcessLog, SemanticStep,
    SessionTrace, StepKind, SubagentProcess,
};

use crate::config::EngineConfig;
use crate::context::accumulate;
use crate::linkage::link_tool_executions;
use crate::metrics::session_metrics;
use crate::parallel::detect_parallel_groups;
use crate::segment::build_segments;
use crate::steps::{process_steps, segment_steps};
use crate::subagent::{collect_spawn_invocations, resolve_subagents};

/// Everything one reconstruction run consumes, fully read up front.
#[derive(Debug, Clone, Default)]
pub struct SessionInput {
    pub entries: Vec<LogEntry>,
    pub parse_report: ParseReport,
    pub process_logs: Vec<ProcessLog>,
    /// Processes the loader already gave up on (e.g. unreadable files).
    pub omitted: Vec<OmittedProcess>,
}

/// Run the fixed pipeline over one session.
///
/// Pure function of its input: the same input always yields the same trace.
/// Never fails; degraded input shows up as omitted processes, skipped lines
/// and unsegmented entries on the result.
pub fn reconstruct(input: SessionInput, config: &EngineConfig) -> SessionTrace {
    let SessionInput {
        entries,
        parse_report,
        process_logs,
        mut omitted,
    } = input;

    let segmentation = build_segments(&entries);
    let mut segments = segmentation.segments;
    for segment in &mut segments {
        segment.tool_executions = link_tool_executions(segment.entries());
    }

    let spawns = collect_spawn_invocations(&entries, config);
    let resolution = resolve_subagents(process_logs, &spawns, config);
    omitted.extend(resolution.omitted);
    let mut processes = resolution.processes;

    let parallel_groups = detect_parallel_groups(&mut processes, config.parallel_window_ms);

    // A process belongs to the segment holding its spawn, else the one holding
    // its start. Anchors before the first trigger fall to the first segment.
    let spawn_times: HashMap<&str, _> = spawns
        .iter()
        .map(|s| (s.invocation_id.as_str(), s.timestamp))
        .collect();
    let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); segments.len()];
    for (pidx, process) in processes.iter().enumerate() {
        let anchor = process
            .invocation_id
            .as_deref()
            .and_then(|id| spawn_times.get(id).copied())
            .unwrap_or(process.start);
        let owner = segments.iter().position(|s| s.contains(anchor)).or_else(|| {
            segments
                .first()
                .filter(|first| anchor < first.start)
                .map(|_| 0)
        });
        match owner {
            Some(sidx) => assigned[sidx].push(pidx),
            None => tracing::debug!(process = %process.id, "subagent in a session without segments"),
        }
    }

    for process in &mut processes {
        process.steps = process_steps(process, config);
    }

    let satisfied: HashSet<String> = processes
        .iter()
        .filter_map(|p| p.invocation_id.clone())
        .collect();

    for (segment, members) in segments.iter_mut().zip(&assigned) {
        let linked: Vec<_> = members.iter().map(|i| &processes[*i]).collect();
        segment.subagent_ids = linked.iter().map(|p| p.id.clone()).collect();
        segment.steps = segment_steps(segment, &linked, &satisfied, config);
    }

    let mut timeline = build_timeline(&segments, &processes);
    accumulate(&mut timeline, config.context_baseline);

    // Write accumulated values back onto the per-segment and per-process copies.
    let context: HashMap<&str, u64> = timeline
        .iter()
        .map(|s| (s.id.as_str(), s.accumulated_context))
        .collect();
    let steps_mut = segments
        .iter_mut()
        .flat_map(|s| s.steps.iter_mut())
        .chain(processes.iter_mut().flat_map(|p| p.steps.iter_mut()));
    for step in steps_mut {
        if let Some(value) = context.get(step.id.as_str()) {
            step.accumulated_context = *value;
        }
    }

    let primary: Vec<&LogEntry> = entries.iter().filter(|e| !e.is_sidechain).collect();
    let metrics = session_metrics(&primary, &segments, &processes);

    let tool_executions = segments
        .iter()
        .flat_map(|s| s.tool_executions.iter().cloned())
        .collect();

    tracing::debug!(
        segments = segments.len(),
        subagents = processes.len(),
        omitted = omitted.len(),
        steps = timeline.len(),
        "session reconstructed"
    );

    SessionTrace {
        segments,
        tool_executions,
        subagents: processes,
        parallel_groups,
        timeline,
        metrics,
        parse_report,
        omitted_processes: omitted,
        unsegmented: segmentation.unsegmented,
    }
}

/// Segment steps in order, each subagent step followed by that process's steps.
fn build_timeline(segments: &[ExecutionSegment], processes: &[SubagentProcess]) -> Vec<SemanticStep> {
    let mut timeline = Vec::new();
    for step in segments.iter().flat_map(|s| s.steps.iter()) {
        timeline.push(step.clone());
        let StepKind::Subagent { process_id, .. } = &step.kind else {
            continue;
        };
        if let Some(process) = processes.iter().find(|p| &p.id == process_id) {
            timeline.extend(process.steps.iter().cloned());
        }
    }
    timeline
}
