//! Storage location configuration.
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! database = "~/.local/share/quire/workspace.db"
//! busy_timeout_ms = 5000
//! ```
//!
//! # Environment Variables
//!
//! - `QUIRE_DATABASE` - Override the database file path
//! - `QUIRE_DATA_DIR` - Override the data directory used for the default path

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default database filename within the data directory.
const DATABASE_FILE: &str = "workspace.db";

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database. Relative paths are resolved from the
    /// data directory.
    pub database: Option<PathBuf>,

    /// How long a writer waits on a locked database before failing.
    /// Default: 5000ms
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl StorageConfig {
    /// Get the effective database path, checking the environment first.
    ///
    /// Resolution order:
    /// 1. `QUIRE_DATABASE` environment variable
    /// 2. Configured `database` value (relative to the data directory)
    /// 3. Default: `<data dir>/workspace.db`
    pub fn effective_database_path(&self) -> PathBuf {
        if let Ok(env_path) = std::env::var("QUIRE_DATABASE")
            && !env_path.is_empty()
        {
            return PathBuf::from(env_path);
        }

        match &self.database {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => default_data_dir().join(path),
            None => default_data_dir().join(DATABASE_FILE),
        }
    }
}

/// Data directory for Quire.
///
/// Checks `QUIRE_DATA_DIR` first, then the platform data directory.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("QUIRE_DATA_DIR")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("quire"))
        .unwrap_or_else(|| PathBuf::from(".quire"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_defaults() {
        let config = StorageConfig::default();
        assert!(config.database.is_none());
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_absolute_database_path_kept() {
        if std::env::var("QUIRE_DATABASE").is_ok() {
            return;
        }
        let config = StorageConfig {
            database: Some(PathBuf::from("/tmp/quire-test/ws.db")),
            ..StorageConfig::default()
        };
        assert_eq!(
            config.effective_database_path(),
            PathBuf::from("/tmp/quire-test/ws.db")
        );
    }

    #[test]
    fn test_default_database_under_data_dir() {
        if std::env::var("QUIRE_DATABASE").is_ok() {
            return;
        }
        let path = StorageConfig::default().effective_database_path();
        assert!(path.ends_with("workspace.db"));
    }
}
