use std::path::{Path, PathBuf};

use stepscope_engine::{
    extract_tool_errors, reconstruct, summarize_errors, EngineConfig, ErrorCategory, LinkageKind,
    SessionInput,
};
use stepscope_providers::{
    default_subagents_dir, discover_subagent_files, load_subagent_logs, parse_session_file,
};
use stepscope_types::{OmitReason, SessionTrace, TokenUsage};

fn sample_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../stepscope-providers/tests/samples/session-parallel.jsonl")
}

fn load(config: &EngineConfig) -> anyhow::Result<SessionTrace> {
    let path = sample_path();
    let parsed = parse_session_file(&path)?;
    let dir = default_subagents_dir(&path).expect("sample has a file stem");
    let (process_logs, omitted) = load_subagent_logs(&discover_subagent_files(&dir)?);

    Ok(reconstruct(
        SessionInput {
            entries: parsed.entries,
            parse_report: parsed.report,
            process_logs,
            omitted,
        },
        config,
    ))
}

#[test]
fn test_sample_segments_and_subagents() -> anyhow::Result<()> {
    let trace = load(&EngineConfig::default())?;

    assert_eq!(trace.segments.len(), 3);
    assert_eq!(trace.segments[1].trigger.entry.id, "u3");

    let ids: Vec<_> = trace.subagents.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["aaa111", "bbb222"]);
    assert!(trace.subagents.iter().all(|p| p.is_parallel));
    assert_eq!(trace.subagents[0].invocation_id.as_deref(), Some("t1"));
    assert_eq!(trace.subagents[1].invocation_id.as_deref(), Some("t2"));
    assert_eq!(trace.subagents[0].role.as_deref(), Some("Explore"));

    assert_eq!(trace.omitted_processes.len(), 1);
    assert_eq!(trace.omitted_processes[0].process_id, "warm00");
    assert_eq!(trace.omitted_processes[0].reason, OmitReason::WarmupSentinel);

    assert_eq!(trace.parallel_groups.len(), 1);
    assert_eq!(trace.parallel_groups[0].members, vec!["aaa111", "bbb222"]);

    Ok(())
}

#[test]
fn test_sample_timeline_labels() -> anyhow::Result<()> {
    let trace = load(&EngineConfig::default())?;
    let labels: Vec<_> = trace.timeline.iter().map(|s| s.label()).collect();

    insta::assert_json_snapshot!(labels, @r###"
    [
      "thinking",
      "subagent",
      "tool_call",
      "tool_result",
      "output",
      "subagent",
      "output",
      "tool_result",
      "tool_result",
      "tool_call",
      "tool_result",
      "output",
      "output",
      "output",
      "interruption"
    ]
    "###);

    Ok(())
}

#[test]
fn test_sample_context_accumulation() -> anyhow::Result<()> {
    let trace = load(&EngineConfig::default())?;
    let values: Vec<_> = trace.timeline.iter().map(|s| s.accumulated_context).collect();

    assert_eq!(
        values,
        vec![1150, 1150, 700, 700, 1500, 1150, 370, 1150, 1150, 2850, 2850, 4760, 4760, 6510, 6510]
    );

    // Per-process copies carry the same values as the flattened timeline.
    let nested: Vec<_> = trace.subagents[0]
        .steps
        .iter()
        .map(|s| s.accumulated_context)
        .collect();
    assert_eq!(nested, vec![700, 700, 1500]);

    Ok(())
}

#[test]
fn test_sample_metrics() -> anyhow::Result<()> {
    let trace = load(&EngineConfig::default())?;
    let m = trace.metrics;

    assert_eq!(m.segment_count, 3);
    assert_eq!(m.message_count, 15);
    assert_eq!(m.tool_call_count, 3);
    assert_eq!(m.subagent_count, 2);
    assert_eq!(m.parallel_subagent_count, 2);
    assert_eq!(m.duration_ms, 122_000);
    assert_eq!(m.tokens, TokenUsage::new(660, 145, 5800, 60));
    assert_eq!(m.subagent_tokens, TokenUsage::new(1150, 55, 300, 420));

    Ok(())
}

#[test]
fn test_sample_tool_errors() -> anyhow::Result<()> {
    let trace = load(&EngineConfig::default())?;
    let errors = extract_tool_errors(&trace);

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].entry_id, "r3");
    assert_eq!(errors[0].tool_name.as_deref(), Some("Bash"));
    assert_eq!(errors[0].category, ErrorCategory::ExitCode);
    assert_eq!(errors[0].agent_id, None);

    let summary = summarize_errors(&errors);
    assert_eq!(summary.by_category.len(), 1);
    assert_eq!(summary.by_category[0].category, ErrorCategory::ExitCode);
    assert_eq!(summary.by_category[0].count, 1);
    assert_eq!(summary.by_category[0].examples.len(), 1);

    Ok(())
}

#[test]
fn test_reference_linkage_agrees_on_sample() -> anyhow::Result<()> {
    let config = EngineConfig {
        linkage: LinkageKind::Reference,
        ..EngineConfig::default()
    };
    let trace = load(&config)?;

    let links: Vec<_> = trace
        .subagents
        .iter()
        .map(|p| (p.id.as_str(), p.invocation_id.as_deref()))
        .collect();
    assert_eq!(links, vec![("aaa111", Some("t1")), ("bbb222", Some("t2"))]);

    Ok(())
}
