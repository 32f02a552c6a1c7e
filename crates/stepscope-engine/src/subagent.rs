//! Subagent resolution: turn independently stored process logs into
//! [`SubagentProcess`] records and link each to the invocation that spawned it.
//!
//! Linkage is a replaceable strategy ([`SubagentLinker`]). The default pairs
//! processes and spawns by position; [`ReferenceLinker`] uses the agent id a
//! spawn result announces and falls back to another linker for the rest.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use stepscope_types::{
    span_ms, ContentBlock, LogEntry, OmitReason, OmittedProcess, ProcessLog, SubagentProcess,
};

use crate::config::{EngineConfig, LinkageKind};
use crate::metrics::process_metrics;

/// A spawn-type tool invocation found on the primary thread.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnInvocation {
    pub invocation_id: String,
    pub name: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Position in session arrival order.
    pub arrival: usize,
    /// Agent id announced by the matching result, when the format supplies one.
    pub agent_ref: Option<String>,
}

/// Every spawn invocation in the session, in arrival order.
pub fn collect_spawn_invocations(entries: &[LogEntry], config: &EngineConfig) -> Vec<SpawnInvocation> {
    let mut agent_refs: HashMap<&str, &str> = HashMap::new();
    for entry in entries.iter().filter(|e| !e.is_sidechain) {
        let (Some(agent), Some(content)) = (entry.spawned_agent_id(), entry.content()) else {
            continue;
        };
        for block in content.blocks() {
            if let ContentBlock::ToolResult { invocation_id, .. } = block {
                agent_refs.entry(invocation_id.as_str()).or_insert(agent);
            }
        }
    }

    let mut spawns = Vec::new();
    for entry in entries.iter().filter(|e| !e.is_sidechain && e.is_assistant()) {
        let (Some(ts), Some(content)) = (entry.timestamp, entry.content()) else {
            continue;
        };
        for block in content.blocks() {
            let ContentBlock::ToolInvocation { id, name, input } = block else {
                continue;
            };
            if !config.is_spawn_tool(name) {
                continue;
            }
            spawns.push(SpawnInvocation {
                invocation_id: id.clone(),
                name: name.clone(),
                description: input_str(input, "description"),
                role: input_str(input, "subagent_type"),
                timestamp: ts,
                arrival: spawns.len(),
                agent_ref: agent_refs.get(id.as_str()).map(|s| s.to_string()),
            });
        }
    }
    spawns
}

fn input_str(input: &serde_json::Value, key: &str) -> Option<String> {
    input.get(key).and_then(|v| v.as_str()).map(String::from)
}

/// Decides which spawn (if any) each process belongs to.
///
/// `processes` are sorted by start time, `spawns` by arrival. The returned
/// vector has one slot per process holding an index into `spawns`.
pub trait SubagentLinker {
    fn link(&self, processes: &[SubagentProcess], spawns: &[SpawnInvocation]) -> Vec<Option<usize>>;
}

/// i-th process pairs with the i-th spawn, cycling when processes outnumber spawns.
///
/// Assumes strict temporal 1:1 correlation; degrades under many concurrent
/// spawns or out-of-order file materialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalLinker;

impl SubagentLinker for PositionalLinker {
    fn link(&self, processes: &[SubagentProcess], spawns: &[SpawnInvocation]) -> Vec<Option<usize>> {
        if spawns.is_empty() {
            return vec![None; processes.len()];
        }
        (0..processes.len()).map(|i| Some(i % spawns.len())).collect()
    }
}

/// Exact match on the spawn result's announced agent id.
pub struct ReferenceLinker {
    fallback: Box<dyn SubagentLinker>,
}

impl ReferenceLinker {
    pub fn new(fallback: Box<dyn SubagentLinker>) -> Self {
        Self { fallback }
    }
}

impl Default for ReferenceLinker {
    fn default() -> Self {
        Self::new(Box::new(PositionalLinker))
    }
}

impl SubagentLinker for ReferenceLinker {
    fn link(&self, processes: &[SubagentProcess], spawns: &[SpawnInvocation]) -> Vec<Option<usize>> {
        let mut links: Vec<Option<usize>> = processes
            .iter()
            .map(|p| {
                spawns
                    .iter()
                    .position(|s| s.agent_ref.as_deref() == Some(p.id.as_str()))
            })
            .collect();

        let claimed: Vec<usize> = links.iter().flatten().copied().collect();
        let open_spawns: Vec<usize> = (0..spawns.len()).filter(|i| !claimed.contains(i)).collect();
        let open_processes: Vec<usize> = (0..processes.len()).filter(|i| links[*i].is_none()).collect();

        if open_processes.is_empty() {
            return links;
        }

        let rest_processes: Vec<SubagentProcess> =
            open_processes.iter().map(|i| processes[*i].clone()).collect();
        let rest_spawns: Vec<SpawnInvocation> =
            open_spawns.iter().map(|i| spawns[*i].clone()).collect();

        let fallback = self.fallback.link(&rest_processes, &rest_spawns);
        for (slot, link) in open_processes.iter().zip(fallback) {
            links[*slot] = link.and_then(|j| open_spawns.get(j).copied());
        }
        links
    }
}

pub fn linker_for(kind: LinkageKind) -> Box<dyn SubagentLinker> {
    match kind {
        LinkageKind::Positional => Box::new(PositionalLinker),
        LinkageKind::Reference => Box::new(ReferenceLinker::default()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Resolved processes sorted by start time.
    pub processes: Vec<SubagentProcess>,
    pub omitted: Vec<OmittedProcess>,
}

/// Build process records from their logs and link them to spawns.
///
/// The warm-up probe and logs without any timestamp are omitted, never
/// surfaced. Linked processes inherit the spawn's description and role.
pub fn resolve_subagents(
    logs: Vec<ProcessLog>,
    spawns: &[SpawnInvocation],
    config: &EngineConfig,
) -> Resolution {
    let mut resolution = Resolution::default();

    for log in logs {
        if is_warmup(&log.entries, &config.warmup_sentinel) {
            tracing::debug!(process = %log.process_id, "warm-up process discarded");
            resolution.omitted.push(omit(log, OmitReason::WarmupSentinel, None));
            continue;
        }

        let mut timestamps = log.entries.iter().filter_map(|e| e.timestamp);
        let Some(first) = timestamps.next() else {
            tracing::warn!(process = %log.process_id, "subagent log has no timestamped entries");
            let detail = format!("{} entries, none timestamped", log.entries.len());
            resolution.omitted.push(omit(log, OmitReason::Empty, Some(detail)));
            continue;
        };
        let (start, end) = timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));

        resolution.processes.push(SubagentProcess {
            metrics: process_metrics(&log.entries),
            id: log.process_id,
            source: log.source,
            entries: log.entries,
            start,
            end,
            duration_ms: span_ms(start, end),
            invocation_id: None,
            is_parallel: false,
            group_id: None,
            description: None,
            role: None,
            steps: Vec::new(),
        });
    }

    resolution
        .processes
        .sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let links = linker_for(config.linkage).link(&resolution.processes, spawns);
    for (process, link) in resolution.processes.iter_mut().zip(links) {
        let Some(spawn) = link.and_then(|i| spawns.get(i)) else {
            tracing::debug!(process = %process.id, "subagent left unlinked");
            continue;
        };
        process.invocation_id = Some(spawn.invocation_id.clone());
        process.description = spawn.description.clone();
        process.role = spawn.role.clone();
    }

    resolution
}

/// First conversational entry's content is exactly the sentinel.
fn is_warmup(entries: &[LogEntry], sentinel: &str) -> bool {
    entries
        .iter()
        .find_map(|e| e.content())
        .and_then(|c| c.sole_text())
        .is_some_and(|text| text == sentinel)
}

fn omit(log: ProcessLog, reason: OmitReason, detail: Option<String>) -> OmittedProcess {
    OmittedProcess {
        process_id: log.process_id,
        source: log.source,
        reason,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::path::PathBuf;
    use stepscope_types::{EntryKind, MessageContent, TokenUsage};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn user(id: &str, ms: Option<i64>, text: &str) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            parent_id: None,
            timestamp: ms.map(at),
            is_sidechain: true,
            is_meta: false,
            source_invocation_id: None,
            agent_id: None,
            usage: TokenUsage::new(1, 2, 3, 4),
            line: 1,
            kind: EntryKind::User {
                content: MessageContent::Text(text.to_string()),
                spawned_agent_id: None,
            },
        }
    }

    fn log(id: &str, entries: Vec<LogEntry>) -> ProcessLog {
        ProcessLog {
            process_id: id.to_string(),
            source: PathBuf::from(format!("agent-{}.jsonl", id)),
            entries,
        }
    }

    fn spawn(id: &str, arrival: usize, agent_ref: Option<&str>) -> SpawnInvocation {
        SpawnInvocation {
            invocation_id: id.to_string(),
            name: "Task".to_string(),
            description: Some(format!("desc {}", id)),
            role: Some("Explore".to_string()),
            timestamp: at(arrival as i64),
            arrival,
            agent_ref: agent_ref.map(String::from),
        }
    }

    #[test]
    fn test_warmup_and_empty_are_omitted() {
        let logs = vec![
            log("warm", vec![user("w", Some(0), "Warmup")]),
            log("empty", vec![user("e", None, "hi")]),
            log("real", vec![user("r1", Some(10), "go"), user("r2", Some(40), "done")]),
        ];
        let resolution = resolve_subagents(logs, &[], &EngineConfig::default());

        assert_eq!(resolution.processes.len(), 1);
        let process = &resolution.processes[0];
        assert_eq!(process.id, "real");
        assert_eq!(process.duration_ms, 30);
        assert_eq!(process.metrics.tokens, TokenUsage::new(2, 4, 6, 8));
        assert!(!process.is_linked());

        let reasons: Vec<_> = resolution.omitted.iter().map(|o| o.reason).collect();
        assert_eq!(reasons, vec![OmitReason::WarmupSentinel, OmitReason::Empty]);
    }

    #[test]
    fn test_warmup_needs_exact_match() {
        let logs = vec![log("p", vec![user("w", Some(0), "Warmup please")])];
        let resolution = resolve_subagents(logs, &[], &EngineConfig::default());
        assert_eq!(resolution.processes.len(), 1);
    }

    #[test]
    fn test_positional_pairs_by_start_and_copies_metadata() {
        let logs = vec![
            log("second", vec![user("b", Some(200), "go")]),
            log("first", vec![user("a", Some(100), "go")]),
        ];
        let spawns = vec![spawn("t1", 0, None), spawn("t2", 1, None)];
        let resolution = resolve_subagents(logs, &spawns, &EngineConfig::default());

        let pairs: Vec<_> = resolution
            .processes
            .iter()
            .map(|p| (p.id.as_str(), p.invocation_id.as_deref()))
            .collect();
        assert_eq!(pairs, vec![("first", Some("t1")), ("second", Some("t2"))]);
        assert_eq!(resolution.processes[0].description.as_deref(), Some("desc t1"));
        assert_eq!(resolution.processes[0].role.as_deref(), Some("Explore"));
    }

    #[test]
    fn test_positional_cycles_spawns() {
        let processes: Vec<SubagentProcess> = resolve_subagents(
            vec![
                log("a", vec![user("a", Some(1), "go")]),
                log("b", vec![user("b", Some(2), "go")]),
                log("c", vec![user("c", Some(3), "go")]),
            ],
            &[],
            &EngineConfig::default(),
        )
        .processes;

        let spawns = vec![spawn("t1", 0, None), spawn("t2", 1, None)];
        assert_eq!(
            PositionalLinker.link(&processes, &spawns),
            vec![Some(0), Some(1), Some(0)]
        );
        assert_eq!(PositionalLinker.link(&processes, &[]), vec![None, None, None]);
    }

    #[test]
    fn test_reference_linker_matches_exactly_then_falls_back() {
        let processes = resolve_subagents(
            vec![
                log("aaa", vec![user("a", Some(1), "go")]),
                log("bbb", vec![user("b", Some(2), "go")]),
            ],
            &[],
            &EngineConfig::default(),
        )
        .processes;

        // Announced ids disagree with start order.
        let spawns = vec![spawn("t1", 0, Some("bbb")), spawn("t2", 1, None)];
        let links = ReferenceLinker::default().link(&processes, &spawns);
        assert_eq!(links, vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_collect_spawns_with_agent_refs() {
        let assistant = LogEntry {
            kind: EntryKind::Assistant {
                content: MessageContent::Blocks(vec![
                    ContentBlock::ToolInvocation {
                        id: "t1".to_string(),
                        name: "Task".to_string(),
                        input: json!({"description": "Explore parser", "subagent_type": "Explore"}),
                    },
                    ContentBlock::ToolInvocation {
                        id: "t2".to_string(),
                        name: "Bash".to_string(),
                        input: json!({}),
                    },
                ]),
                model: None,
                request_id: None,
            },
            is_sidechain: false,
            ..user("a", Some(0), "")
        };
        let result = LogEntry {
            kind: EntryKind::User {
                content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                    invocation_id: "t1".to_string(),
                    payload: json!("done"),
                    is_error: false,
                }]),
                spawned_agent_id: Some("aaa".to_string()),
            },
            is_sidechain: false,
            ..user("r", Some(5), "")
        };

        let spawns = collect_spawn_invocations(&[assistant, result], &EngineConfig::default());
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].invocation_id, "t1");
        assert_eq!(spawns[0].description.as_deref(), Some("Explore parser"));
        assert_eq!(spawns[0].role.as_deref(), Some("Explore"));
        assert_eq!(spawns[0].agent_ref.as_deref(), Some("aaa"));
    }
}
