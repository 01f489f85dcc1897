//! History command - list versions of a file.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use super::{Context, print_json, resolve_node, truncate};

/// Arguments for the history command.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// File path or node id
    pub path: String,

    /// Maximum versions to show
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Run the history command.
pub fn run(args: HistoryArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let node = resolve_node(&store, ctx, &args.path)?;
    let history = store.get_history(&ctx.tenant, &node.id, args.limit)?;

    if ctx.json_output {
        return print_json(&history);
    }

    let dim = Style::new().dim();
    println!("{}", style(format!("History of {}", node.path)).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    if history.is_empty() {
        println!("{}", dim.apply_to("No versions"));
    }
    for version in &history {
        println!(
            "{}  {}  {:<40} {}",
            version.id,
            version.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&version.summary, 40),
            dim.apply_to(format!("{} words, by {}", version.word_count, version.created_by))
        );
    }
    Ok(())
}
