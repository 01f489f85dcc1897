//! Rm command - soft-delete a node and its subtree.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{Context, print_json, resolve_node};

/// Arguments for the rm command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Node path or id
    pub path: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    path: String,
    deleted: usize,
}

/// Run the rm command.
pub fn run(args: RmArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let node = resolve_node(&store, ctx, &args.path)?;
    let deleted = store.delete_node(&ctx.tenant, &node.id, &ctx.actor)?;

    if ctx.json_output {
        return print_json(&RmOutput {
            path: node.path,
            deleted,
        });
    }
    let noun = if deleted == 1 { "node" } else { "nodes" };
    println!(
        "{} Deleted {} ({} {})",
        Style::new().green().apply_to("✓"),
        node.path,
        deleted,
        noun
    );
    Ok(())
}
