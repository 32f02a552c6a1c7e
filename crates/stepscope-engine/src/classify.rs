//! Entry classification: every entry is exactly one of Trigger, Flow, Noise
//! or CommandOutput, decided from its own fields alone.
//!
//! Rule order for user entries:
//! 1. content wrapped entirely by a system-metadata tag → Noise
//!    (slash-command entries are exempt)
//! 2. content containing a local command output tag → CommandOutput
//! 3. meta flag set → Flow
//! 4. user-authored payload (non-empty string, or any text/image block) that
//!    is not an interruption marker → Trigger
//! 5. otherwise → Flow
//!
//! A block list mixing a text block with tool-result blocks is Trigger-eligible:
//! the text block decides, co-located results are ignored.

use stepscope_types::{EntryCategory, EntryKind, LogEntry, MessageContent};

/// Tags whose sole presence marks a user entry as system metadata.
pub const NOISE_TAGS: &[&str] = &["local-command-caveat", "system-reminder"];

/// Tags marking system-generated output of a local command.
pub const COMMAND_OUTPUT_TAGS: &[&str] = &["local-command-stdout", "local-command-stderr"];

/// Marks a user-issued slash command; real user action, never noise.
pub const COMMAND_NAME_TAG: &str = "<command-name>";

/// Literal content the agent writes when the user interrupts a response.
pub const INTERRUPTION_MARKERS: &[&str] = &[
    "[Request interrupted by user]",
    "[Request interrupted by user for tool use]",
];

pub fn classify(entry: &LogEntry) -> EntryCategory {
    match &entry.kind {
        EntryKind::User { content, .. } => classify_user(entry, content),
        EntryKind::Assistant { .. } => EntryCategory::Flow,
        EntryKind::System { .. }
        | EntryKind::Summary { .. }
        | EntryKind::Snapshot
        | EntryKind::QueueOperation { .. } => EntryCategory::Noise,
    }
}

fn classify_user(entry: &LogEntry, content: &MessageContent) -> EntryCategory {
    let text = content.joined_text();

    if !text.contains(COMMAND_NAME_TAG) && is_metadata_wrapped(&text) {
        return EntryCategory::Noise;
    }

    if COMMAND_OUTPUT_TAGS
        .iter()
        .any(|tag| text.contains(&format!("<{}>", tag)))
    {
        return EntryCategory::CommandOutput;
    }

    if entry.is_meta {
        return EntryCategory::Flow;
    }

    if content.has_user_payload() && !is_interruption(content) {
        EntryCategory::Trigger
    } else {
        EntryCategory::Flow
    }
}

/// Whole trimmed text is `<tag>...</tag>` for one of [`NOISE_TAGS`].
fn is_metadata_wrapped(text: &str) -> bool {
    let trimmed = text.trim();
    NOISE_TAGS.iter().any(|tag| {
        let open = format!("<{}>", tag);
        let close = format!("</{}>", tag);
        trimmed.starts_with(&open) && trimmed.ends_with(&close)
    })
}

/// Content whose sole piece is an interruption marker.
pub fn is_interruption(content: &MessageContent) -> bool {
    content
        .sole_text()
        .is_some_and(|text| INTERRUPTION_MARKERS.contains(&text.trim()))
}

pub fn is_trigger(entry: &LogEntry) -> bool {
    classify(entry) == EntryCategory::Trigger
}
