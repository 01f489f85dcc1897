//! Revert command - copy an earlier version forward.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::{Context, print_json, resolve_node, short_id};

/// Arguments for the revert command.
#[derive(Args, Debug)]
pub struct RevertArgs {
    /// File path or node id
    pub path: String,

    /// Version to restore
    pub version: String,
}

/// Run the revert command.
pub fn run(args: RevertArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let node = resolve_node(&store, ctx, &args.path)?;
    let version = store.revert(&ctx.tenant, &node.id, &args.version, &ctx.actor)?;

    if ctx.json_output {
        return print_json(&version);
    }
    println!(
        "{} Reverted {} to {} {}",
        Style::new().green().apply_to("✓"),
        node.path,
        short_id(&args.version),
        Style::new()
            .dim()
            .apply_to(format!("(new version {})", version.id))
    );
    Ok(())
}
