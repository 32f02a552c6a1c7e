use crate::Result;
use std::path::{Path, PathBuf};
use stepscope_types::{OmitReason, OmittedProcess, ProcessLog};
use walkdir::WalkDir;

use super::io::parse_session_file;

/// A process file announced by discovery, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubagentSource {
    pub process_id: String,
    pub path: PathBuf,
}

/// Process id for a subagent file: the file stem without the `agent-` prefix.
pub fn process_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let id = stem.strip_prefix("agent-").unwrap_or(stem);
    (!id.is_empty()).then(|| id.to_string())
}

/// Conventional location of subagent files for a session log:
/// `<dir>/<session-stem>/subagents/`.
pub fn default_subagents_dir(session_path: &Path) -> Option<PathBuf> {
    let stem = session_path.file_stem()?;
    let parent = session_path.parent().unwrap_or_else(|| Path::new("."));
    Some(parent.join(stem).join("subagents"))
}

/// List `*.jsonl` process files directly inside `dir`, sorted by path.
///
/// A missing directory means the session spawned nothing and yields an
/// empty list.
pub fn discover_subagent_files(dir: &Path) -> Result<Vec<SubagentSource>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();

        if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "jsonl") {
            continue;
        }

        match process_id_from_path(path) {
            Some(process_id) => sources.push(SubagentSource {
                process_id,
                path: path.to_path_buf(),
            }),
            None => {
                tracing::warn!(path = ?path, "skipping subagent file with empty process id");
            }
        }
    }

    Ok(sources)
}

/// Read every announced process file.
///
/// A file that cannot be read is reported as omitted; the rest load normally.
pub fn load_subagent_logs(sources: &[SubagentSource]) -> (Vec<ProcessLog>, Vec<OmittedProcess>) {
    let mut logs = Vec::with_capacity(sources.len());
    let mut omitted = Vec::new();

    for source in sources {
        match parse_session_file(&source.path) {
            Ok(parsed) => logs.push(ProcessLog {
                process_id: source.process_id.clone(),
                source: source.path.clone(),
                entries: parsed.entries,
            }),
            Err(e) => {
                tracing::warn!(path = ?source.path, error = %e, "omitting unreadable subagent file");
                omitted.push(OmittedProcess {
                    process_id: source.process_id.clone(),
                    source: source.path.clone(),
                    reason: OmitReason::Unreadable,
                    detail: Some(e.to_string()),
                });
            }
        }
    }

    (logs, omitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_from_path() {
        assert_eq!(
            process_id_from_path(Path::new("/x/subagents/agent-a1b2c3.jsonl")),
            Some("a1b2c3".to_string())
        );
        assert_eq!(
            process_id_from_path(Path::new("worker.jsonl")),
            Some("worker".to_string())
        );
        assert_eq!(process_id_from_path(Path::new("/x/agent-.jsonl")), None);
    }

    #[test]
    fn test_default_subagents_dir() {
        assert_eq!(
            default_subagents_dir(Path::new("/logs/proj/abc-123.jsonl")),
            Some(PathBuf::from("/logs/proj/abc-123/subagents"))
        );
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let sources = discover_subagent_files(Path::new("/definitely/not/here")).unwrap();
        assert!(sources.is_empty());
    }
}
