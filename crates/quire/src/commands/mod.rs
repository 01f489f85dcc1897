//! CLI command handlers.

pub mod cat;
pub mod config;
pub mod diff;
pub mod history;
pub mod init;
pub mod mkdir;
pub mod mv;
pub mod put;
pub mod revert;
pub mod rm;
pub mod search;
pub mod staging;
pub mod tree;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use quire_config::LoadedConfig;
use quire_workspace::{Node, WorkspaceSettings, WorkspaceStore};
use serde::Serialize;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Tenant namespace.
    pub tenant: String,
    /// Actor recorded on changes.
    pub actor: String,
    /// Database file.
    pub db_path: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Resolved configuration and where it came from.
    pub loaded: LoadedConfig,
}

impl Context {
    /// Open the workspace database with settings from the loaded config.
    pub fn open_store(&self) -> Result<WorkspaceStore> {
        let settings = WorkspaceSettings::from_config(&self.loaded.config);
        WorkspaceStore::open_with_settings(&self.db_path, settings)
            .with_context(|| format!("failed to open {}", self.db_path.display()))
    }
}

/// Resolve a node by workspace path, falling back to its id.
pub fn resolve_node(store: &WorkspaceStore, ctx: &Context, reference: &str) -> Result<Node> {
    match store.get_node_by_path(&ctx.tenant, reference) {
        Ok(node) => Ok(node),
        Err(path_err) => store
            .get_node(&ctx.tenant, reference)
            .map_err(|_| anyhow::Error::from(path_err)),
    }
}

/// Resolve an optional folder reference; `None` or `/` means the root.
pub fn resolve_folder(
    store: &WorkspaceStore,
    ctx: &Context,
    reference: Option<&str>,
) -> Result<Option<Node>> {
    match reference.map(str::trim) {
        None | Some("") | Some("/") => Ok(None),
        Some(reference) => {
            let node = resolve_node(store, ctx, reference)?;
            if !node.is_folder() {
                bail!("{} is not a folder", node.path);
            }
            Ok(Some(node))
        }
    }
}

/// Split `a/b/name` into the parent reference and the last segment.
pub fn split_parent(path: &str) -> (Option<&str>, &str) {
    let trimmed = path.trim().trim_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => (Some(parent), name),
        None => (None, trimmed),
    }
}

/// Content from `--content`, `--file`, or stdin, in that order.
pub fn read_input(content: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read content from stdin")?;
    Ok(buf)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First line of `s`, shortened to `max_len` characters.
pub fn truncate(s: &str, max_len: usize) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() <= max_len {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// First eight characters of an id.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
