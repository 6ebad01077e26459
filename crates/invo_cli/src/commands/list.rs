//! List command - Show tasks defined in the control file.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::GlobalArgs;

#[derive(Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: ListArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = global.load_context()?;
    let summary = ctx.summary();

    if args.json {
        let tasks: Vec<_> = summary
            .iter()
            .map(|(id, steps)| json!({ "task": id, "steps": steps }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if summary.is_empty() {
        println!("No tasks defined");
        return Ok(());
    }

    let width = summary.iter().map(|(id, _)| id.len()).max().unwrap_or(0);
    for (id, steps) in &summary {
        let noun = if *steps == 1 { "step" } else { "steps" };
        println!("{:<width$}  {} {}", id, steps, noun, width = width);
    }

    Ok(())
}
