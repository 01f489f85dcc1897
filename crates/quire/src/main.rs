//! Quire - workspace content engine
//!
//! Main entry point for the Quire CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

mod commands;

use commands::{
    cat, config, diff, history, init, mkdir, mv, put, revert, rm, search, staging, tree,
};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Quire - versioned workspace with staged draft review
#[derive(Parser)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Tenant whose namespace to operate on
    #[arg(long, global = true, env = "QUIRE_TENANT", default_value = "default")]
    pub tenant: String,

    /// Actor recorded on every change
    #[arg(long, global = true, env = "QUIRE_ACTOR", default_value = "cli")]
    pub actor: String,

    /// Database file (default: from config, then the data directory)
    #[arg(long, global = true, env = "QUIRE_DATABASE")]
    pub db: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and the default folder layout
    Init(init::InitArgs),

    /// Show the folder tree
    Tree(tree::TreeArgs),

    /// Create a folder
    Mkdir(mkdir::MkdirArgs),

    /// Create a file or write a new version of it
    Put(put::PutArgs),

    /// Print file content
    #[command(disable_version_flag = true)]
    Cat(cat::CatArgs),

    /// Rename or move a node
    Mv(mv::MvArgs),

    /// Delete a node and everything beneath it
    Rm(rm::RmArgs),

    /// Show the version history of a file
    History(history::HistoryArgs),

    /// Compare two versions of a file
    Diff(diff::DiffArgs),

    /// Restore an earlier version as a new version
    #[command(disable_version_flag = true)]
    Revert(revert::RevertArgs),

    /// Submit and review staged drafts
    Staging(staging::StagingArgs),

    /// Search names, paths and content
    Search(search::SearchArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = quire_config::load_config(None)?;
    let logging = loaded.config.logging_settings();

    // Console (human-readable, stderr) + optional rotating JSON file
    let filter = match (&logging.filter, cli.verbose) {
        (_, true) => "quire=debug,quire_workspace=debug,quire_config=debug,info".to_string(),
        (Some(filter), false) => filter.clone(),
        (None, false) => "quire=info,quire_workspace=warn,quire_config=warn,warn".to_string(),
    };

    let log_dir = logging.directory.clone().unwrap_or_else(|| {
        quire_config::user_config_dir()
            .map(|d| d.join("logs"))
            .unwrap_or_else(|| std::path::PathBuf::from("logs"))
    });
    let (file_layer, _guard) = if logging.file {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "quire.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        (Some(non_blocking), Some(guard))
    } else {
        (None, None)
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "quire=trace,quire_workspace=trace,quire_config=trace,info",
                ))
        }))
        .init();

    for warning in &loaded.warnings {
        warn!(warning = %warning, "Configuration warning");
    }

    let db_path = cli
        .db
        .unwrap_or_else(|| loaded.config.storage_settings().effective_database_path());

    // Create context for commands
    let ctx = commands::Context {
        tenant: cli.tenant,
        actor: cli.actor,
        db_path,
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Init(args) => init::run(args, &ctx),
        Commands::Tree(args) => tree::run(args, &ctx),
        Commands::Mkdir(args) => mkdir::run(args, &ctx),
        Commands::Put(args) => put::run(args, &ctx),
        Commands::Cat(args) => cat::run(args, &ctx),
        Commands::Mv(args) => mv::run(args, &ctx),
        Commands::Rm(args) => rm::run(args, &ctx),
        Commands::History(args) => history::run(args, &ctx),
        Commands::Diff(args) => diff::run(args, &ctx),
        Commands::Revert(args) => revert::run(args, &ctx),
        Commands::Staging(args) => staging::run(args, &ctx),
        Commands::Search(args) => search::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
    }
}
