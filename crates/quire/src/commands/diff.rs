//! Diff command - line diff between two versions.

use anyhow::Result;
use clap::Args;
use console::Style;
use quire_workspace::HunkKind;

use super::{Context, print_json};

/// Arguments for the diff command.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// First version id
    pub a: String,

    /// Second version id (order does not matter; the older is the base)
    pub b: String,
}

/// Run the diff command.
pub fn run(args: DiffArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let diff = store.diff(&ctx.tenant, &args.a, &args.b)?;

    if ctx.json_output {
        return print_json(&diff);
    }

    let dim = Style::new().dim();
    let red = Style::new().red();
    let green = Style::new().green();
    println!("{}", dim.apply_to(format!("--- {}", diff.base_version_id)));
    println!("{}", dim.apply_to(format!("+++ {}", diff.target_version_id)));
    if diff.is_empty() {
        println!("{}", dim.apply_to("(no differences)"));
        return Ok(());
    }

    for hunk in &diff.hunks {
        let kind = match hunk.kind {
            HunkKind::Insert => "insert",
            HunkKind::Delete => "delete",
            HunkKind::Replace => "replace",
        };
        println!(
            "{}",
            Style::new().cyan().apply_to(format!(
                "@@ -{},{} +{},{} @@ {}",
                hunk.base_start + 1,
                hunk.removed.len(),
                hunk.target_start + 1,
                hunk.added.len(),
                kind
            ))
        );
        for line in &hunk.removed {
            println!("{}", red.apply_to(format!("-{line}")));
        }
        for line in &hunk.added {
            println!("{}", green.apply_to(format!("+{line}")));
        }
    }

    if ctx.verbose {
        let (added, removed) = diff.line_counts();
        println!("{}", dim.apply_to(format!("{added} added, {removed} removed")));
    }
    Ok(())
}
