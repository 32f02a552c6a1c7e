use crate::handlers::HandlerContext;
use crate::output::{format_duration, format_tokens, print_json};
use crate::types::OutputFormat;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stepscope_types::{OmittedProcess, ParallelGroup, ProcessMetrics, SessionTrace};

#[derive(Debug, Serialize)]
struct SubagentRow<'a> {
    id: &'a str,
    invocation_id: Option<&'a str>,
    description: Option<&'a str>,
    role: Option<&'a str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    duration_ms: i64,
    is_parallel: bool,
    group_id: Option<&'a str>,
    metrics: ProcessMetrics,
    step_count: usize,
}

#[derive(Debug, Serialize)]
struct SubagentReport<'a> {
    subagents: Vec<SubagentRow<'a>>,
    parallel_groups: &'a [ParallelGroup],
    omitted: &'a [OmittedProcess],
}

pub fn handle(ctx: &HandlerContext, trace: &SessionTrace) -> Result<()> {
    ctx.reject_csv("subagents")?;

    let rows: Vec<SubagentRow> = trace
        .subagents
        .iter()
        .map(|p| SubagentRow {
            id: &p.id,
            invocation_id: p.invocation_id.as_deref(),
            description: p.description.as_deref(),
            role: p.role.as_deref(),
            start: p.start,
            end: p.end,
            duration_ms: p.duration_ms,
            is_parallel: p.is_parallel,
            group_id: p.group_id.as_deref(),
            metrics: p.metrics,
            step_count: p.steps.len(),
        })
        .collect();

    if ctx.format == OutputFormat::Json {
        return print_json(&SubagentReport {
            subagents: rows,
            parallel_groups: &trace.parallel_groups,
            omitted: &trace.omitted_processes,
        });
    }

    let p = &ctx.palette;
    if rows.is_empty() {
        println!("{}", p.dim("No subagent processes."));
    }

    for row in &rows {
        let link = match row.invocation_id {
            Some(id) => p.ok(&format!("<- {}", id)),
            None => p.error("unlinked"),
        };
        let parallel = match row.group_id {
            Some(group) => format!(" [parallel {}]", group),
            None => String::new(),
        };
        println!(
            "{} {} {}{}",
            p.accent(row.id),
            link,
            row.role.unwrap_or("agent"),
            parallel
        );
        if let Some(desc) = row.description {
            println!("    {}", desc);
        }
        println!(
            "    {} {}, {} messages, {} tool calls, {} steps",
            p.dim(&row.start.format("%H:%M:%S%.3f").to_string()),
            format_duration(row.duration_ms),
            row.metrics.message_count,
            row.metrics.tool_call_count,
            row.step_count
        );
        println!("    {}", format_tokens(&row.metrics.tokens));
    }

    let parallel: Vec<&ParallelGroup> = trace
        .parallel_groups
        .iter()
        .filter(|g| g.is_parallel())
        .collect();
    if !parallel.is_empty() {
        println!();
        println!("{}", p.header("Parallel groups"));
        for group in parallel {
            println!("  {}: {}", group.id, group.members.join(", "));
        }
    }

    if !trace.omitted_processes.is_empty() {
        println!();
        println!("{}", p.header("Omitted"));
        for omitted in &trace.omitted_processes {
            let reason = serde_json::to_value(omitted.reason)?;
            println!(
                "  {} ({}) {}",
                omitted.process_id,
                reason.as_str().unwrap_or("unknown"),
                p.dim(&omitted.source.display().to_string())
            );
        }
    }

    Ok(())
}
