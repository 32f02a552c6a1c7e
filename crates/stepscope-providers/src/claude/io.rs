use crate::{Error, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use stepscope_types::{LogEntry, ParseReport, SkippedLine};

use super::mapper::map_record;
use super::schema::{ClaudeRecord, KNOWN_RECORD_TYPES};

const BUFFER_SIZE: usize = 64 * 1024;

/// Entries read from one log file plus what was skipped on the way.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub entries: Vec<LogEntry>,
    pub report: ParseReport,
}

/// Parse a session JSONL file into entries.
///
/// Only failing to open or read the file is an error. Individual lines that
/// are not valid JSON or not a usable record are skipped and reported.
pub fn parse_session_file(path: &Path) -> Result<ParsedLog> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let parsed = parse_session_reader(reader)?;

    if !parsed.report.skipped.is_empty() {
        tracing::warn!(
            path = ?path,
            skipped = parsed.report.skipped.len(),
            "skipped malformed lines while reading session log"
        );
    }
    Ok(parsed)
}

/// Parse JSONL from any buffered reader, line by line.
pub fn parse_session_reader<R: BufRead>(reader: R) -> Result<ParsedLog> {
    let mut parsed = ParsedLog::default();

    for (idx, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        let line_no = idx + 1;
        parsed.report.lines_read += 1;

        let Ok(line) = std::str::from_utf8(&raw) else {
            skip(&mut parsed.report, line_no, "line is not valid UTF-8".to_string());
            continue;
        };
        push_line(&mut parsed, line, line_no);
    }

    parsed.report.entries_parsed = parsed.entries.len();
    Ok(parsed)
}

/// Parse JSONL already held in memory.
pub fn parse_session_str(text: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();

    for (idx, line) in text.lines().enumerate() {
        parsed.report.lines_read += 1;
        push_line(&mut parsed, line, idx + 1);
    }

    parsed.report.entries_parsed = parsed.entries.len();
    parsed
}

fn push_line(parsed: &mut ParsedLog, line: &str, line_no: usize) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    match parse_line(line, line_no) {
        Ok(Some(entry)) => parsed.entries.push(entry),
        Ok(None) => {}
        Err(e) => skip(&mut parsed.report, line_no, e.to_string()),
    }
}

/// `Ok(None)` means a well-formed record of a type this reader does not model.
fn parse_line(line: &str, line_no: usize) -> Result<Option<LogEntry>> {
    let value: Value = serde_json::from_str(line)?;

    let record_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::Parse("record has no type field".to_string()))?;

    if !KNOWN_RECORD_TYPES.contains(&record_type.as_str()) {
        tracing::trace!(line = line_no, record_type = %record_type, "ignoring unmodelled record type");
        return Ok(None);
    }

    let record: ClaudeRecord = serde_json::from_value(value)
        .map_err(|e| Error::Parse(format!("invalid {} record: {}", record_type, e)))?;

    map_record(record, line_no).map(Some)
}

fn skip(report: &mut ParseReport, line: usize, reason: String) {
    tracing::debug!(line, reason = %reason, "skipping malformed line");
    report.skipped.push(SkippedLine { line, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOG: &str = r#"{"type":"summary","summary":"Fixing a bug","leafUuid":"a1"}
{"type":"user","uuid":"u1","timestamp":"2025-01-01T10:00:00Z","message":{"role":"user","content":"fix the bug"}}
this is not json
{"type":"progress","uuid":"p1","timestamp":"2025-01-01T10:00:00.500Z"}
{"type":"assistant","uuid":"a1","parentUuid":"u1","timestamp":"2025-01-01T10:00:01Z","message":{"content":[{"type":"text","text":"On it"}]}}
{"type":"user","uuid":"u9","timestamp":"garbage","message":{"role":"user","content":"x"}}

"#;

    #[test]
    fn test_malformed_lines_are_skipped_not_fatal() {
        let parsed = parse_session_str(LOG);

        let ids: Vec<_> = parsed.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(&ids[1..], &["u1", "a1"]);

        let skipped_lines: Vec<_> = parsed.report.skipped.iter().map(|s| s.line).collect();
        assert_eq!(skipped_lines, vec![3, 6]);
        assert_eq!(parsed.report.entries_parsed, 3);
        assert_eq!(parsed.report.lines_read, 7);
    }

    #[test]
    fn test_reader_matches_in_memory_parse() {
        let from_reader = parse_session_reader(Cursor::new(LOG.as_bytes())).unwrap();
        let from_str = parse_session_str(LOG);
        assert_eq!(from_reader.entries, from_str.entries);
        assert_eq!(from_reader.report.skipped, from_str.report.skipped);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut bytes = b"\xff\xfe\n".to_vec();
        bytes.extend_from_slice(
            br#"{"type":"user","uuid":"u1","timestamp":"2025-01-01T10:00:00Z","message":{"role":"user","content":"hi"}}"#,
        );
        let parsed = parse_session_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.report.skipped.len(), 1);
        assert_eq!(parsed.report.skipped[0].line, 1);
    }

    #[test]
    fn test_skip_reasons_name_the_failure() {
        let parsed = parse_session_str(
            "{not json\n{\"uuid\":\"x\"}\n{\"type\":\"user\",\"uuid\":\"u1\"}\n",
        );

        let reasons: Vec<_> = parsed.report.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(reasons.len(), 3);
        assert!(reasons[0].starts_with("JSON error"));
        assert_eq!(reasons[1], "Parse error: record has no type field");
        assert!(reasons[2].starts_with("Parse error: invalid user record"));
    }
}
