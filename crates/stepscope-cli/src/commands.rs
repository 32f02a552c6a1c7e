use crate::args::{Cli, Commands};
use crate::config::Config;
use crate::handlers::{self, HandlerContext};
use crate::session_loader::load_trace;
use crate::types::LogLevel;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(&cli);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(window_ms) = cli.window_ms {
        if window_ms < 0 {
            anyhow::bail!("--window-ms must not be negative (got {})", window_ms);
        }
        config.engine.parallel_window_ms = window_ms;
    }
    if let Some(linkage) = cli.linkage {
        config.engine.linkage = linkage;
    }
    tracing::debug!(
        window_ms = config.engine.parallel_window_ms,
        linkage = %config.engine.linkage,
        "effective engine config"
    );

    let ctx = HandlerContext::new(cli.format);

    match cli.command {
        Commands::Show { session } => {
            let trace = load_trace(&session, &config.engine)?;
            handlers::show::handle(&ctx, &trace)
        }
        Commands::Steps { session } => {
            let trace = load_trace(&session, &config.engine)?;
            handlers::steps::handle(&ctx, &trace)
        }
        Commands::Subagents { session } => {
            let trace = load_trace(&session, &config.engine)?;
            handlers::subagents::handle(&ctx, &trace)
        }
        Commands::Errors { session } => {
            let trace = load_trace(&session, &config.engine)?;
            handlers::errors::handle(&ctx, &trace)
        }
    }
}

fn init_tracing(cli: &Cli) {
    let directive = filter_directive(cli.log_level, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// `--log-level` first, then `RUST_LOG`, then `warn`. Logs always go to stderr.
fn filter_directive(level: Option<LogLevel>, rust_log: Option<String>) -> String {
    match (level, rust_log) {
        (Some(level), _) => level.to_string(),
        (None, Some(env)) if !env.trim().is_empty() => env,
        _ => LogLevel::Warn.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flag_beats_rust_log() {
        let directive = filter_directive(Some(LogLevel::Debug), Some("trace".to_string()));
        assert_eq!(directive, "debug");
    }

    #[test]
    fn test_rust_log_used_without_flag() {
        let directive = filter_directive(None, Some("stepscope_engine=trace".to_string()));
        assert_eq!(directive, "stepscope_engine=trace");
    }

    #[test]
    fn test_defaults_to_warn() {
        assert_eq!(filter_directive(None, None), "warn");
        assert_eq!(filter_directive(None, Some("  ".to_string())), "warn");
    }
}
