//! Init command - create the database and default layout.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{Context, print_json};

/// Arguments for the init command.
#[derive(Args, Debug)]
pub struct InitArgs {}

#[derive(Debug, Serialize)]
struct InitOutput {
    database: String,
    tenant: String,
    layout_created: bool,
}

/// Run the init command.
pub fn run(_args: InitArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let created = store.ensure_default_layout(&ctx.tenant, &ctx.actor)?;

    if ctx.json_output {
        return print_json(&InitOutput {
            database: ctx.db_path.display().to_string(),
            tenant: ctx.tenant.clone(),
            layout_created: created,
        });
    }

    let green = Style::new().green();
    let dim = Style::new().dim();
    if created {
        println!(
            "{} Initialized workspace for tenant {}",
            green.apply_to("✓"),
            ctx.tenant
        );
    } else {
        println!("Workspace for tenant {} already initialized", ctx.tenant);
    }
    println!("  {} {}", dim.apply_to("Database:"), ctx.db_path.display());
    Ok(())
}
