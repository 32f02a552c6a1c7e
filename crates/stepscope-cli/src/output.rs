use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use serde::Serialize;
use stepscope_types::{StepKind, TokenUsage};

/// Colors only when stdout is a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn detect() -> Self {
        Self {
            enabled: std::io::stdout().is_terminal(),
        }
    }

    pub fn header(&self, s: &str) -> String {
        if self.enabled {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }

    pub fn dim(&self, s: &str) -> String {
        if self.enabled {
            s.dimmed().to_string()
        } else {
            s.to_string()
        }
    }

    pub fn accent(&self, s: &str) -> String {
        if self.enabled {
            s.cyan().to_string()
        } else {
            s.to_string()
        }
    }

    pub fn error(&self, s: &str) -> String {
        if self.enabled {
            s.red().to_string()
        } else {
            s.to_string()
        }
    }

    pub fn ok(&self, s: &str) -> String {
        if self.enabled {
            s.green().to_string()
        } else {
            s.to_string()
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `1m 05s`, `12.3s` or `450ms`.
pub fn format_duration(ms: i64) -> String {
    if ms >= 60_000 {
        format!("{}m {:02}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// Thousands separators: 1234567 -> 1,234,567.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_tokens(tokens: &TokenUsage) -> String {
    format!(
        "in {} / out {} / cache read {} / cache write {}",
        format_number(tokens.input),
        format_number(tokens.output),
        format_number(tokens.cache_read),
        format_number(tokens.cache_creation)
    )
}

/// One-line summary of what a step did.
pub fn step_summary(kind: &StepKind, max: usize) -> String {
    let text = match kind {
        StepKind::Thinking { text } => text.clone(),
        StepKind::ToolCall { name, input, .. } => format!("{} {}", name, input),
        StepKind::ToolResult {
            invocation_id,
            payload,
            is_error,
        } => {
            let mark = if *is_error { "error" } else { "ok" };
            format!(
                "{} [{}] {}",
                invocation_id,
                mark,
                stepscope_types::payload_text(payload)
            )
        }
        StepKind::Subagent {
            process_id,
            description,
            role,
            message_count,
            ..
        } => format!(
            "{} ({}) {} - {} messages",
            process_id,
            role.as_deref().unwrap_or("agent"),
            description.as_deref().unwrap_or(""),
            message_count
        ),
        StepKind::Output { text, .. } | StepKind::Interruption { text } => text.clone(),
    };
    stepscope_types::truncate(&text.replace('\n', " "), max)
}
