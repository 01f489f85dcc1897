//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [storage]                # database location and lock timeout
//! [tree]                   # default layout and listing depth
//! [history]                # version history limits
//! [staging]                # review SLA and deadline policy
//! [naming]                 # artifact naming policy
//! [search]                 # search limits
//! [logging]                # file logging
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths::StorageConfig;
use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Maps to the full TOML config file. All sections are optional so that
/// partial configs (e.g., project-local overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuireConfig {
    /// Database settings.
    pub storage: Option<StorageConfig>,

    /// Node tree settings.
    pub tree: Option<TreeConfig>,

    /// Version history settings.
    pub history: Option<HistoryConfig>,

    /// Staging review settings.
    pub staging: Option<StagingConfig>,

    /// Artifact naming policy.
    pub naming: Option<NamingConfig>,

    /// Search settings.
    pub search: Option<SearchConfig>,

    /// Logging settings.
    pub logging: Option<LoggingConfig>,
}

impl QuireConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is per section: a section present in `other` replaces the
    /// whole section in `self`.
    pub fn merge(&mut self, other: QuireConfig) {
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.tree.is_some() {
            self.tree = other.tree;
        }
        if other.history.is_some() {
            self.history = other.history;
        }
        if other.staging.is_some() {
            self.staging = other.staging;
        }
        if other.naming.is_some() {
            self.naming = other.naming;
        }
        if other.search.is_some() {
            self.search = other.search;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let tree = self.tree_settings();
        if tree.default_depth == 0 || tree.default_depth > tree.max_depth {
            return Err(invalid(
                "tree.default_depth",
                format!("must be between 1 and max_depth ({})", tree.max_depth),
            ));
        }

        let history = self.history_settings();
        if history.max_limit == 0 || history.default_limit > history.max_limit {
            return Err(invalid(
                "history.default_limit",
                format!("must not exceed max_limit ({})", history.max_limit),
            ));
        }

        let search = self.search_settings();
        if search.max_limit == 0 || search.default_limit > search.max_limit {
            return Err(invalid(
                "search.default_limit",
                format!("must not exceed max_limit ({})", search.max_limit),
            ));
        }

        let staging = self.staging_settings();
        if staging.sla_hours <= 0 {
            return Err(invalid("staging.sla_hours", "must be positive".to_string()));
        }

        let naming = self.naming_settings();
        if naming.max_name_len < 8 {
            return Err(invalid("naming.max_name_len", "must be at least 8".to_string()));
        }
        if naming.filename_template.trim().is_empty() {
            return Err(invalid(
                "naming.filename_template",
                "must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Storage section, or defaults.
    pub fn storage_settings(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    /// Tree section, or defaults.
    pub fn tree_settings(&self) -> TreeConfig {
        self.tree.clone().unwrap_or_default()
    }

    /// History section, or defaults.
    pub fn history_settings(&self) -> HistoryConfig {
        self.history.clone().unwrap_or_default()
    }

    /// Staging section, or defaults.
    pub fn staging_settings(&self) -> StagingConfig {
        self.staging.clone().unwrap_or_default()
    }

    /// Naming section, or defaults.
    pub fn naming_settings(&self) -> NamingConfig {
        self.naming.clone().unwrap_or_default()
    }

    /// Search section, or defaults.
    pub fn search_settings(&self) -> SearchConfig {
        self.search.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging_settings(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

fn invalid(field: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Node tree configuration.
///
/// ```toml
/// [tree]
/// default_layout = ["Outline", "Draft", "Research", "Asset", "Staging"]
/// default_depth = 2
/// max_depth = 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Top-level folders created for a tenant with an empty namespace.
    pub default_layout: Vec<String>,
    /// Nesting depth returned by tree listings when the caller gives none.
    pub default_depth: usize,
    /// Upper bound for requested listing depth.
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            default_layout: ["Outline", "Draft", "Research", "Asset", "Staging"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_depth: 2,
            max_depth: 8,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// History Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Version history limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries returned when the caller gives no limit (default: 20).
    pub default_limit: usize,
    /// Hard cap on entries per request (default: 100).
    pub max_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Staging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Staging review policy.
///
/// ```toml
/// [staging]
/// sla_hours = 48
/// enforce_deadline = false
/// default_requires_secondary = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Review horizon from submission, in hours.
    pub sla_hours: i64,
    /// Reject approvals on entries past their SLA deadline.
    pub enforce_deadline: bool,
    /// Require a secondary review when the submitter does not say.
    pub default_requires_secondary: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            sla_hours: 48,
            enforce_deadline: false,
            default_requires_secondary: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Naming Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Artifact naming policy.
///
/// Template placeholders: `{agent}`, `{type}`, `{timestamp}`, `{seq}`, `{title}`.
///
/// ```toml
/// [naming]
/// organize_by_agent = true
/// organize_by_session = false
/// filename_template = "{type}-{title}-{seq}"
/// max_name_len = 48
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Place artifacts under a per-agent directory.
    pub organize_by_agent: bool,
    /// Place artifacts under a per-session directory.
    pub organize_by_session: bool,
    /// File name template (without extension).
    pub filename_template: String,
    /// Maximum length of a generated name stem, in characters.
    pub max_name_len: usize,
    /// `chrono` format string used for `{timestamp}` and name suffixes.
    pub timestamp_format: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            organize_by_agent: false,
            organize_by_session: false,
            filename_template: "{type}-{title}-{seq}".to_string(),
            max_name_len: 48,
            timestamp_format: "%Y%m%d-%H%M%S".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Search Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Search limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hits returned when the caller gives no limit.
    pub default_limit: usize,
    /// Hard cap on hits per request.
    pub max_limit: usize,
    /// Length of content snippets attached to hits.
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            snippet_chars: 160,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration for the command-line front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write a daily-rotated JSON log file.
    pub file: bool,
    /// Directory for log files. Defaults to `<config dir>/logs`.
    pub directory: Option<PathBuf>,
    /// Console filter directive (e.g. `quire=debug`). Overrides the default.
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: true,
            directory: None,
            filter: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
