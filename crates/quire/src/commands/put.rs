//! Put command - create a file or replace its content.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;
use quire_workspace::{AutoNamingPolicy, WriteContent, infer_extension};

use super::{Context, print_json, read_input, resolve_folder, short_id};

/// Arguments for the put command.
#[derive(Args, Debug)]
pub struct PutArgs {
    /// File name (default: derived from the content)
    pub name: Option<String>,

    /// Folder to write into (default: the root)
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Content to write (default: read from --file or stdin)
    #[arg(short, long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read content from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Version summary
    #[arg(short, long, default_value = "Updated via cli")]
    pub summary: String,

    /// Version id the replacement is based on (required for existing files)
    #[arg(long)]
    pub if_match: Option<String>,

    /// Artifact type used to derive a name and extension
    #[arg(long = "type", default_value = "draft")]
    pub artifact_type: String,

    /// Agent credited as author
    #[arg(long)]
    pub agent: Option<String>,
}

/// Run the put command.
pub fn run(args: PutArgs, ctx: &Context) -> Result<()> {
    let content = read_input(args.content, args.file)?;
    let store = ctx.open_store()?;
    let parent = resolve_folder(&store, ctx, args.parent.as_deref())?;

    let name = match args.name {
        Some(name) => name,
        None => {
            let policy = AutoNamingPolicy::new(store.settings().naming.clone());
            let stem = policy.suggest_name(None, &content, &args.artifact_type, chrono::Utc::now());
            format!("{stem}.{}", infer_extension(&args.artifact_type, &content))
        }
    };

    let mut write = WriteContent::new(content, args.summary).with_tool("cli");
    if let Some(agent) = args.agent {
        write = write.with_agent(agent);
    }

    let outcome = store.put_file(
        &ctx.tenant,
        parent.as_ref().map(|p| p.id.as_str()),
        &name,
        write,
        args.if_match.as_deref(),
        &ctx.actor,
    )?;

    if ctx.json_output {
        return print_json(&outcome);
    }

    let green = Style::new().green();
    let dim = Style::new().dim();
    let verb = if outcome.created { "Created" } else { "Updated" };
    println!(
        "{} {} {} {}",
        green.apply_to("✓"),
        verb,
        outcome.file.node.path,
        dim.apply_to(format!("(version {})", short_id(&outcome.file.version.id)))
    );
    if ctx.verbose {
        println!("  {} {}", dim.apply_to("Version:"), outcome.file.version.id);
    }
    Ok(())
}
