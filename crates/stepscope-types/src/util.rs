use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp(raw.to_string()))
}

/// Truncate a string to a maximum number of characters, appending "..." when cut
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Milliseconds between two instants; negative spans clamp to zero.
pub fn span_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_with_offset() {
        let ts = parse_timestamp("2025-01-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(
            parse_timestamp("yesterday"),
            Err(Error::InvalidTimestamp("yesterday".to_string()))
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_span_ms_clamps() {
        let a = parse_timestamp("2025-01-01T00:00:01Z").unwrap();
        let b = parse_timestamp("2025-01-01T00:00:00Z").unwrap();
        assert_eq!(span_ms(a, b), 0);
        assert_eq!(span_ms(b, a), 1000);
    }
}
