//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use quire_config::QuireConfig;
use serde::Serialize;

use super::{Context, print_json};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration and the files it came from
    Show,

    /// Show configuration file paths and the database in use
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./quire.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { local, force } => cmd_init(ctx, local, force),
    }
}

#[derive(Debug, Serialize)]
struct PathOutput {
    user_config: Option<PathBuf>,
    project_config: PathBuf,
    database: PathBuf,
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let resolved = resolved(&loaded.config);

    if ctx.json_output {
        return print_json(&resolved);
    }

    println!("# Quire Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        for source in &sources {
            println!("# from {}", source.display());
        }
        println!();
    }

    if !loaded.warnings.is_empty() {
        for w in &loaded.warnings {
            println!("# warning: {}", w);
        }
        println!();
    }

    println!("{}", resolved.to_toml()?);
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let output = PathOutput {
        user_config: quire_config::user_config_path(),
        project_config: PathBuf::from("quire.toml"),
        database: ctx.db_path.clone(),
    };

    if ctx.json_output {
        return print_json(&output);
    }

    println!("Config file search order (later overrides earlier):\n");
    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} [{}] {}", status, source.layer, source.path.display());
    }
    println!();
    println!("Database: {}", output.database.display());
    Ok(())
}

fn cmd_init(ctx: &Context, local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("quire.toml")
    } else {
        match quire_config::user_config_path() {
            Some(p) => p,
            None => bail!("could not determine config directory"),
        }
    };

    if path.exists() && !force {
        bail!(
            "config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    quire_config::save_config(&resolved(&QuireConfig::new()), &path)?;

    if ctx.json_output {
        return print_json(&serde_json::json!({ "path": path }));
    }
    println!("Created config file: {}", path.display());
    Ok(())
}

/// Every section filled in with its effective values.
fn resolved(config: &QuireConfig) -> QuireConfig {
    QuireConfig {
        storage: Some(config.storage_settings()),
        tree: Some(config.tree_settings()),
        history: Some(config.history_settings()),
        staging: Some(config.staging_settings()),
        naming: Some(config.naming_settings()),
        search: Some(config.search_settings()),
        logging: Some(config.logging_settings()),
    }
}
