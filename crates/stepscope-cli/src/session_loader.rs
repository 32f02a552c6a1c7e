use crate::args::SessionArgs;
use anyhow::{Context, Result};
use stepscope_engine::{reconstruct, EngineConfig, SessionInput};
use stepscope_providers::{
    default_subagents_dir, discover_subagent_files, load_subagent_logs, parse_session_file,
};
use stepscope_types::SessionTrace;

/// Read the session log and its subagent files, then reconstruct.
///
/// Only an unreadable session log is fatal. Subagent problems end up in
/// `omitted_processes` on the trace.
pub fn load_trace(args: &SessionArgs, config: &EngineConfig) -> Result<SessionTrace> {
    let parsed = parse_session_file(&args.path)
        .with_context(|| format!("Failed to read session log: {}", args.path.display()))?;

    let dir = args
        .subagents_dir
        .clone()
        .or_else(|| default_subagents_dir(&args.path));

    let (process_logs, omitted) = match dir {
        Some(dir) => {
            let sources = discover_subagent_files(&dir)
                .with_context(|| format!("Failed to list subagent logs: {}", dir.display()))?;
            tracing::debug!(dir = ?dir, files = sources.len(), "discovered subagent logs");
            load_subagent_logs(&sources)
        }
        None => (Vec::new(), Vec::new()),
    };

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
