use crate::handlers::HandlerContext;
use crate::output::{format_duration, format_number, format_tokens, print_json};
use crate::types::OutputFormat;
use anyhow::Result;
use stepscope_types::{truncate, SessionTrace};

pub fn handle(ctx: &HandlerContext, trace: &SessionTrace) -> Result<()> {
    ctx.reject_csv("show")?;
    if ctx.format == OutputFormat::Json {
        return print_json(trace);
    }

    let p = &ctx.palette;
    let m = &trace.metrics;

    println!("{}", p.header("Session"));
    println!(
        "  {} segments, {} messages, {} tool calls, {}",
        m.segment_count,
        m.message_count,
        m.tool_call_count,
        format_duration(m.duration_ms)
    );
    println!(
        "  {} subagents ({} parallel)",
        m.subagent_count, m.parallel_subagent_count
    );
    println!("  tokens:    {}", format_tokens(&m.tokens));
    if m.subagent_count > 0 {
        println!("  subagents: {}", format_tokens(&m.subagent_tokens));
    }

    if trace.is_empty() {
        println!();
        println!("{}", p.dim("No user-initiated segments in this session."));
    }

    for segment in &trace.segments {
        println!();
        let trigger_text = segment
            .trigger
            .entry
            .content()
            .map(|c| c.joined_text())
            .unwrap_or_default();
        println!(
            "{} {} {}",
            p.accent(&format!("#{}", segment.index + 1)),
            p.dim(&segment.start.format("%Y-%m-%d %H:%M:%S").to_string()),
            truncate(&trigger_text.replace('\n', " "), 72)
        );
        println!(
            "   {} messages, {} tool calls, {} steps, {}, {} context tokens",
            segment.metrics.message_count,
            segment.metrics.tool_call_count,
            segment.steps.len(),
            format_duration(segment.metrics.duration_ms),
            format_number(segment.metrics.tokens.context_tokens())
        );
        let failed = segment
            .tool_executions
            .iter()
            .filter(|e| e.result.as_ref().is_some_and(|r| r.is_error))
            .count();
        if failed > 0 {
            println!("   {}", p.error(&format!("{} failed tool calls", failed)));
        }
        if !segment.subagent_ids.is_empty() {
            println!("   subagents: {}", segment.subagent_ids.join(", "));
        }
    }

    print_diagnostics(ctx, trace);
    Ok(())
}

fn print_diagnostics(ctx: &HandlerContext, trace: &SessionTrace) {
    let p = &ctx.palette;
    let skipped = trace.parse_report.skipped.len();
    let omitted = trace.omitted_processes.len();
    let unsegmented = trace.unsegmented.len();

    if skipped + omitted + unsegmented == 0 {
        return;
    }

    println!();
    println!("{}", p.header("Diagnostics"));
    if skipped > 0 {
        println!(
            "  {} of {} lines skipped",
            skipped, trace.parse_report.lines_read
        );
    }
    if omitted > 0 {
        println!("  {} subagent logs omitted", omitted);
    }
    if unsegmented > 0 {
        println!("  {} entries before the first user message", unsegmented);
    }
}
