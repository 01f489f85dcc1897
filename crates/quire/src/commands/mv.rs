//! Mv command - rename and/or move a node.

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;
use console::Style;
use quire_workspace::{MoveTarget, Relocate};

use super::{Context, print_json, resolve_folder, resolve_node};

/// Arguments for the mv command.
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Node path or id
    pub path: String,

    /// New display name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Destination folder
    #[arg(long, conflicts_with = "root")]
    pub into: Option<String>,

    /// Move to the top level
    #[arg(long)]
    pub root: bool,

    /// Fail unless the node was last modified at this RFC 3339 timestamp
    #[arg(long)]
    pub expect: Option<String>,
}

/// Run the mv command.
pub fn run(args: MvArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let node = resolve_node(&store, ctx, &args.path)?;

    let new_parent = if args.root {
        Some(MoveTarget::Root)
    } else {
        match args.into.as_deref() {
            Some(into) => Some(match resolve_folder(&store, ctx, Some(into))? {
                Some(folder) => MoveTarget::Folder(folder.id),
                None => MoveTarget::Root,
            }),
            None => None,
        }
    };
    if new_parent.is_none() && args.name.is_none() {
        bail!("nothing to do: pass --name, --into or --root");
    }

    let expected_updated_at = args
        .expect
        .as_deref()
        .map(|ts| {
            DateTime::parse_from_rfc3339(ts)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("invalid timestamp: {ts}"))
        })
        .transpose()?;

    let moved = store.relocate(
        &ctx.tenant,
        &node.id,
        Relocate {
            new_name: args.name,
            new_parent,
            expected_updated_at,
        },
        &ctx.actor,
    )?;

    if ctx.json_output {
        return print_json(&moved);
    }
    println!(
        "{} {} -> {}",
        Style::new().green().apply_to("✓"),
        node.path,
        moved.path
    );
    Ok(())
}
