//! Tool-error diagnostics over a reconstructed trace.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use stepscope_types::{payload_text, ContentBlock, LogEntry, SessionTrace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ExitCode,
    FileNotFound,
    DirectoryOperation,
    PermissionDenied,
    FileAlreadyExists,
    CommandNotFound,
    SyntaxError,
    TypeError,
    NotFound,
    Timeout,
    Connection,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ExitCode => "exit_code",
            ErrorCategory::FileNotFound => "file_not_found",
            ErrorCategory::DirectoryOperation => "directory_operation",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::FileAlreadyExists => "file_already_exists",
            ErrorCategory::CommandNotFound => "command_not_found",
            ErrorCategory::SyntaxError => "syntax_error",
            ErrorCategory::TypeError => "type_error",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Connection => "connection",
            ErrorCategory::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// First match wins; order matters (ENOENT before the generic phrasing).
static ERROR_PATTERNS: LazyLock<Vec<(Regex, ErrorCategory)>> = LazyLock::new(|| {
    [
        (r"Exit code \d+", ErrorCategory::ExitCode),
        (r"ENOENT", ErrorCategory::FileNotFound),
        (r"EISDIR", ErrorCategory::DirectoryOperation),
        (r"EACCES", ErrorCategory::PermissionDenied),
        (r"EEXIST", ErrorCategory::FileAlreadyExists),
        (r"File does not exist", ErrorCategory::FileNotFound),
        (r"command not found", ErrorCategory::CommandNotFound),
        (r"No such file or directory", ErrorCategory::FileNotFound),
        (r"syntax error", ErrorCategory::SyntaxError),
        (r"type.*Error", ErrorCategory::TypeError),
        (r"Cannot find", ErrorCategory::NotFound),
        (r"timeout", ErrorCategory::Timeout),
        (r"connection", ErrorCategory::Connection),
    ]
    .into_iter()
    .map(|(pattern, category)| (Regex::new(&format!("(?i){}", pattern)).unwrap(), category))
    .collect()
});

pub fn categorize_error(text: &str) -> ErrorCategory {
    ERROR_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Other)
}

/// One failed tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolErrorRecord {
    pub entry_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub invocation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Process the error occurred in; `None` for the primary thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub text: String,
    pub category: ErrorCategory,
}

/// Every `is_error` tool result in the trace, primary thread first, then
/// each process in start order.
pub fn extract_tool_errors(trace: &SessionTrace) -> Vec<ToolErrorRecord> {
    let mut records = Vec::new();

    let primary: Vec<&LogEntry> = trace
        .segments
        .iter()
        .flat_map(|s| s.entries())
        .chain(trace.unsegmented.iter())
        .collect();
    collect_errors(&primary, None, &mut records);

    for process in &trace.subagents {
        let entries: Vec<&LogEntry> = process.entries.iter().collect();
        collect_errors(&entries, Some(&process.id), &mut records);
    }

    records
}

fn collect_errors(entries: &[&LogEntry], agent_id: Option<&str>, out: &mut Vec<ToolErrorRecord>) {
    let names: HashMap<&str, &str> = entries
        .iter()
        .filter_map(|e| e.content())
        .flat_map(|c| c.blocks())
        .filter_map(|b| match b {
            ContentBlock::ToolInvocation { id, name, .. } => Some((id.as_str(), name.as_str())),
            _ => None,
        })
        .collect();

    for entry in entries {
        let Some(content) = entry.content() else {
            continue;
        };
        for block in content.blocks() {
            let ContentBlock::ToolResult {
                invocation_id,
                payload,
                is_error: true,
            } = block
            else {
                continue;
            };
            let text = payload_text(payload);
            out.push(ToolErrorRecord {
                entry_id: entry.id.clone(),
                timestamp: entry.timestamp,
                invocation_id: invocation_id.clone(),
                tool_name: names.get(invocation_id.as_str()).map(|n| n.to_string()),
                agent_id: agent_id.map(String::from),
                category: categorize_error(&text),
                text,
            });
        }
    }
}

/// How many of the newest records a summary keeps.
pub const RECENT_LIMIT: usize = 20;
/// Examples kept per category, in extraction order.
pub const EXAMPLES_PER_CATEGORY: usize = 100;
/// Example text is cut to this many characters.
pub const EXAMPLE_TEXT_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorExample {
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: ErrorCategory,
    pub count: usize,
    pub examples: Vec<ErrorExample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub total: usize,
    /// Largest first, ties by name.
    pub by_category: Vec<CategorySummary>,
    /// Newest first.
    pub recent: Vec<ToolErrorRecord>,
}

pub fn summarize_errors(records: &[ToolErrorRecord]) -> ErrorSummary {
    let mut grouped: HashMap<ErrorCategory, CategorySummary> = HashMap::new();
    for record in records {
        let group = grouped.entry(record.category).or_insert_with(|| CategorySummary {
            category: record.category,
            count: 0,
            examples: Vec::new(),
        });
        group.count += 1;
        if group.examples.len() < EXAMPLES_PER_CATEGORY {
            group.examples.push(ErrorExample {
                timestamp: record.timestamp,
                agent_id: record.agent_id.clone(),
                text: record.text.chars().take(EXAMPLE_TEXT_LIMIT).collect(),
            });
        }
    }

    let mut by_category: Vec<CategorySummary> = grouped.into_values().collect();
    by_category.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });

    let mut recent: Vec<ToolErrorRecord> = records.to_vec();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent.truncate(RECENT_LIMIT);

    ErrorSummary {
        total: records.len(),
        by_category,
        recent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_categorize_in_order() {
        assert_eq!(categorize_error("Exit code 101\nerror[E0308]"), ErrorCategory::ExitCode);
        assert_eq!(
            categorize_error("ENOENT: no such file or directory"),
            ErrorCategory::FileNotFound
        );
        assert_eq!(categorize_error("EISDIR: illegal operation"), ErrorCategory::DirectoryOperation);
        assert_eq!(categorize_error("File does not exist."), ErrorCategory::FileNotFound);
        assert_eq!(categorize_error("bash: rg: command not found"), ErrorCategory::CommandNotFound);
        assert_eq!(categorize_error("TypeError: x is undefined"), ErrorCategory::TypeError);
        assert_eq!(categorize_error("Cannot find module 'x'"), ErrorCategory::NotFound);
        assert_eq!(categorize_error("request TIMEOUT"), ErrorCategory::Timeout);
        assert_eq!(categorize_error("Connection refused"), ErrorCategory::Connection);
        assert_eq!(categorize_error("something odd"), ErrorCategory::Other);
    }

    #[test]
    fn test_categorize_is_case_insensitive() {
        assert_eq!(categorize_error("exit CODE 2"), ErrorCategory::ExitCode);
        assert_eq!(categorize_error("Syntax Error near line 3"), ErrorCategory::SyntaxError);
    }

    fn record(category: ErrorCategory, secs: i64) -> ToolErrorRecord {
        ToolErrorRecord {
            entry_id: format!("e{}", secs),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)),
            invocation_id: format!("t{}", secs),
            tool_name: None,
            agent_id: None,
            text: String::new(),
            category,
        }
    }

    #[test]
    fn test_summary_orders_categories_and_recent() {
        let mut records = vec![
            record(ErrorCategory::Timeout, 1),
            record(ErrorCategory::ExitCode, 2),
            record(ErrorCategory::Timeout, 3),
            record(ErrorCategory::Connection, 4),
        ];
        records.extend((10..40).map(|s| record(ErrorCategory::Other, s)));

        let summary = summarize_errors(&records);
        assert_eq!(summary.total, 34);
        let counts: Vec<_> = summary
            .by_category
            .iter()
            .map(|c| (c.category, c.count))
            .collect();
        assert_eq!(
            counts,
            vec![
                (ErrorCategory::Other, 30),
                (ErrorCategory::Timeout, 2),
                (ErrorCategory::Connection, 1),
                (ErrorCategory::ExitCode, 1),
            ]
        );
        assert_eq!(summary.recent.len(), RECENT_LIMIT);
        assert_eq!(summary.recent[0].entry_id, "e39");
    }

    #[test]
    fn test_examples_are_capped_and_truncated() {
        let records: Vec<_> = (0..120)
            .map(|s| ToolErrorRecord {
                text: "x".repeat(800),
                ..record(ErrorCategory::Other, s)
            })
            .collect();

        let summary = summarize_errors(&records);
        let other = &summary.by_category[0];
        assert_eq!(other.count, 120);
        assert_eq!(other.examples.len(), EXAMPLES_PER_CATEGORY);
        assert_eq!(other.examples[0].timestamp, records[0].timestamp);
        assert!(other.examples.iter().all(|e| e.text.chars().count() == EXAMPLE_TEXT_LIMIT));
    }
}
