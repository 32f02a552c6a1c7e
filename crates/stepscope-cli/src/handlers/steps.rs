use crate::handlers::HandlerContext;
use crate::output::{format_duration, format_number, print_json, step_summary};
use crate::types::OutputFormat;
use anyhow::Result;
use stepscope_types::{SemanticStep, SessionTrace, StepScope};

pub fn handle(ctx: &HandlerContext, trace: &SessionTrace) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => print_json(&trace.timeline),
        OutputFormat::Csv => write_csv(std::io::stdout(), &trace.timeline),
        OutputFormat::Plain => {
            print_plain(ctx, &trace.timeline);
            Ok(())
        }
    }
}

fn print_plain(ctx: &HandlerContext, steps: &[SemanticStep]) {
    let p = &ctx.palette;

    if steps.is_empty() {
        println!("{}", p.dim("No steps."));
        return;
    }

    for step in steps {
        let indent = match step.scope {
            StepScope::Main => "",
            StepScope::Subagent { .. } => "    ",
        };
        let label = format!("{:<12}", step.label());
        let label = match step.label() {
            "subagent" => p.accent(&label),
            "interruption" => p.error(&label),
            _ => label,
        };
        let duration = if step.duration_ms > 0 {
            format!(" ({})", format_duration(step.duration_ms))
        } else {
            String::new()
        };

        println!(
            "{} {}{} {}{} {}",
            p.dim(&step.start.format("%H:%M:%S").to_string()),
            indent,
            label,
            step_summary(&step.kind, 80),
            duration,
            p.dim(&format!("[ctx {}]", format_number(step.accumulated_context)))
        );
    }
}

pub fn write_csv<W: std::io::Write>(out: W, steps: &[SemanticStep]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record([
        "id",
        "scope",
        "start",
        "end",
        "duration_ms",
        "type",
        "summary",
        "tokens_input",
        "tokens_output",
        "tokens_cache_read",
        "tokens_cache_creation",
        "accumulated_context",
    ])?;

    for step in steps {
        let scope = match &step.scope {
            StepScope::Main => "main".to_string(),
            StepScope::Subagent { process_id } => format!("subagent:{}", process_id),
        };
        let tokens = step.tokens.unwrap_or_default();
        let token_cell = |n: u64| {
            if step.tokens.is_some() {
                n.to_string()
            } else {
                String::new()
            }
        };

        wtr.write_record([
            step.id.clone(),
            scope,
            step.start.to_rfc3339(),
            step.end.map(|e| e.to_rfc3339()).unwrap_or_default(),
            step.duration_ms.to_string(),
            step.label().to_string(),
            step_summary(&step.kind, 200),
            token_cell(tokens.input),
            token_cell(tokens.output),
            token_cell(tokens.cache_read),
            token_cell(tokens.cache_creation),
            step.accumulated_context.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
