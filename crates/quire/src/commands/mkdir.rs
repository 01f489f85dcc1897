//! Mkdir command - create a folder.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::{Context, print_json, resolve_folder, split_parent};

/// Arguments for the mkdir command.
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Path of the new folder; the parent must exist
    pub path: String,

    /// Category tag for the folder
    #[arg(long)]
    pub category: Option<String>,
}

/// Run the mkdir command.
pub fn run(args: MkdirArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let (parent, name) = split_parent(&args.path);
    let parent = resolve_folder(&store, ctx, parent)?;

    let folder = store.create_folder(
        &ctx.tenant,
        parent.as_ref().map(|p| p.id.as_str()),
        name,
        args.category.as_deref(),
        &ctx.actor,
    )?;

    if ctx.json_output {
        return print_json(&folder);
    }
    println!(
        "{} Created {}/",
        Style::new().green().apply_to("✓"),
        folder.path
    );
    Ok(())
}
