use crate::types::{LogLevel, OutputFormat};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use stepscope_engine::LinkageKind;

#[derive(Parser)]
#[command(name = "stepscope")]
#[command(about = "Reconstruct agent session logs into segments, subagents and steps", long_about = None)]
#[command(version)]
pub struct Cli {
    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    /// Log verbosity (falls back to RUST_LOG, then warn)
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (falls back to STEPSCOPE_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the parallel-spawn window in milliseconds
    #[arg(long, global = true)]
    pub window_ms: Option<i64>,

    /// Override the subagent linkage strategy
    #[arg(long, global = true, value_parser = parse_linkage)]
    pub linkage: Option<LinkageKind>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Segment-by-segment overview with session metrics
    Show {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Flattened step timeline with accumulated context
    Steps {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Subagent processes, their linkage and parallel groups
    Subagents {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Tool errors grouped by category
    Errors {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    /// Session log (JSONL)
    pub path: PathBuf,

    /// Directory of subagent logs (default: <session-stem>/subagents next to the log)
    #[arg(long)]
    pub subagents_dir: Option<PathBuf>,
}

fn parse_linkage(s: &str) -> Result<LinkageKind, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stepscope",
            "steps",
            "session.jsonl",
            "--format",
            "csv",
            "--linkage",
            "reference",
            "--window-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Csv);
        assert_eq!(cli.linkage, Some(LinkageKind::Reference));
        assert_eq!(cli.window_ms, Some(250));
        assert_eq!(cli.log_level, None);
        assert!(matches!(cli.command, Commands::Steps { .. }));
    }

    #[test]
    fn test_unknown_linkage_rejected() {
        let result = Cli::try_parse_from(["stepscope", "show", "s.jsonl", "--linkage", "nearest"]);
        assert!(result.is_err());
    }
}
