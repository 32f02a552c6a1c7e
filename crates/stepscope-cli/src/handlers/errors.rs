use crate::handlers::HandlerContext;
use crate::output::print_json;
use crate::types::OutputFormat;
use anyhow::Result;
use stepscope_engine::{extract_tool_errors, summarize_errors};
use stepscope_types::{truncate, SessionTrace};

pub fn handle(ctx: &HandlerContext, trace: &SessionTrace) -> Result<()> {
    ctx.reject_csv("errors")?;

    let records = extract_tool_errors(trace);
    let summary = summarize_errors(&records);

    if ctx.format == OutputFormat::Json {
        return print_json(&summary);
    }

    let p = &ctx.palette;
    if summary.total == 0 {
        println!("{}", p.ok("No tool errors."));
        return Ok(());
    }

    println!("{}", p.header(&format!("{} tool errors", summary.total)));
    for group in &summary.by_category {
        println!("  {:<22} {}", group.category.to_string(), group.count);
    }

    println!();
    println!("{}", p.header("Most recent"));
    for record in &summary.recent {
        let when = record
            .timestamp
            .map(|ts| ts.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let origin = record.agent_id.as_deref().unwrap_or("main");
        println!(
            "  {} {} {} {}",
            p.dim(&when),
            p.accent(record.tool_name.as_deref().unwrap_or("?")),
            p.dim(&format!("[{} / {}]", origin, record.category)),
            truncate(&record.text.replace('\n', " "), 80)
        );
    }

    Ok(())
}
