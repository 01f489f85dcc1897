//! SQLite-backed workspace store.
//!
//! One [`WorkspaceStore`] serves every tenant. Operations are grouped by
//! concern:
//!
//! - `node_ops`: folder/file tree, rename/move, soft delete
//! - `version_ops`: content versions, history, diff, revert
//! - `staging_ops`: staging entry persistence
//! - `search_ops`: keyword search over names, paths and latest content
//!
//! Every mutation runs inside [`WorkspaceStore::with_transaction`], so a
//! failure at any step leaves no partial tree or version changes behind.

pub(crate) mod node_ops;
pub(crate) mod staging_ops;
mod search_ops;
pub(crate) mod version_ops;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use quire_config::{
    HistoryConfig, NamingConfig, QuireConfig, SearchConfig, StagingConfig, TreeConfig,
};
use rusqlite::types::Type;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, InterruptHandle, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Result, WorkspaceError};
use crate::layout::LayoutCache;

pub use version_ops::PutOutcome;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Resolved engine settings.
#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    pub tree: TreeConfig,
    pub history: HistoryConfig,
    pub staging: StagingConfig,
    pub naming: NamingConfig,
    pub search: SearchConfig,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self::from_config(&QuireConfig::default())
    }
}

impl WorkspaceSettings {
    pub fn from_config(config: &QuireConfig) -> Self {
        Self {
            tree: config.tree_settings(),
            history: config.history_settings(),
            staging: config.staging_settings(),
            naming: config.naming_settings(),
            search: config.search_settings(),
            busy_timeout: Duration::from_millis(config.storage_settings().busy_timeout_ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workspace Store
// ─────────────────────────────────────────────────────────────────────────────

/// Workspace store backed by SQLite.
///
/// Thread-safe via an internal `Mutex<Connection>`. Uses WAL mode when
/// file-backed.
pub struct WorkspaceStore {
    conn: Mutex<Connection>,
    interrupt: Arc<InterruptHandle>,
    layout: LayoutCache,
    settings: WorkspaceSettings,
}

impl std::fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("layout", &self.layout)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl WorkspaceStore {
    /// Open (or create) the database at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_settings(path, WorkspaceSettings::default())
    }

    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open_with_settings(path: impl AsRef<Path>, settings: WorkspaceSettings) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|_| {
                WorkspaceError::Database(rusqlite::Error::InvalidPath(path.to_path_buf()))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self::from_connection(conn, settings)?;
        info!(path = %path.display(), "Workspace store opened");
        Ok(store)
    }

    /// Open an in-memory database with default settings (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_settings(WorkspaceSettings::default())
    }

    /// Open an in-memory database with explicit settings.
    pub fn open_in_memory_with_settings(settings: WorkspaceSettings) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self::from_connection(conn, settings)?;
        debug!("In-memory workspace store created");
        Ok(store)
    }

    fn from_connection(mut conn: Connection, settings: WorkspaceSettings) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(settings.busy_timeout)?;
        register_functions(&conn)?;

        let report = embedded::migrations::runner()
            .run(&mut conn)
            .map_err(|e| WorkspaceError::Migration(e.to_string()))?;
        for migration in report.applied_migrations() {
            info!(migration = %migration, "Applied migration");
        }

        let interrupt = Arc::new(conn.get_interrupt_handle());
        Ok(Self {
            conn: Mutex::new(conn),
            interrupt,
            layout: LayoutCache::new(),
            settings,
        })
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    /// Handle that aborts whatever statement is running on this store.
    ///
    /// The interrupted operation rolls back and returns
    /// [`WorkspaceError::Cancelled`].
    pub fn interrupt_handle(&self) -> Arc<InterruptHandle> {
        Arc::clone(&self.interrupt)
    }

    pub(crate) fn layout_cache(&self) -> &LayoutCache {
        &self.layout
    }

    /// Execute a closure within an immediate transaction.
    ///
    /// Commits when the closure returns `Ok`; otherwise the transaction is
    /// rolled back on drop.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Run a read-only closure against the connection.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Current time at the precision stored in the database.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    parse_ts(idx, &row.get::<_, String>(idx)?)
}

pub(crate) fn get_opt_ts(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| parse_ts(idx, &s))
        .transpose()
}

pub(crate) fn get_json(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_enum<T: std::str::FromStr<Err = String>>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Registers `fold(text)`: Unicode lowercase, NULL passes through.
///
/// SQLite's own `lower()` and `LIKE` fold ASCII only.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
    )
}
