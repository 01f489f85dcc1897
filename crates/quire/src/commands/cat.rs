//! Cat command - print file content.

use anyhow::{Result, bail};
use clap::Args;

use super::{Context, print_json, resolve_node};

/// Arguments for the cat command.
#[derive(Args, Debug)]
pub struct CatArgs {
    /// File path or node id
    pub path: String,

    /// Print this version instead of the latest
    #[arg(long)]
    pub version: Option<String>,
}

/// Run the cat command.
pub fn run(args: CatArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let node = resolve_node(&store, ctx, &args.path)?;
    let current = store.read_file(&ctx.tenant, &node.id)?;

    let version = match args.version {
        Some(id) => {
            let version = store.get_version(&ctx.tenant, &id)?;
            if version.file_id != current.file.id {
                bail!("version {id} does not belong to {}", node.path);
            }
            version
        }
        None => current.version,
    };

    if ctx.json_output {
        return print_json(&version);
    }
    print!("{}", version.content);
    if !version.content.ends_with('\n') {
        println!();
    }
    Ok(())
}
