//! Locating and layering quire's config files.
//!
//! Quire reads at most two files: the user's `config.toml` and the project's
//! `quire.toml`. Sections present in the project file replace the same
//! sections from the user file. Command-line flags sit on top of both and are
//! applied by the binary.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{ConfigError, QuireConfig, Result};

const PROJECT_CONFIG_FILE: &str = "quire.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "quire";

/// Overrides the user config directory when set and non-empty.
const CONFIG_DIR_ENV: &str = "QUIRE_CONFIG_DIR";

/// Which of the two config files a source refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    User,
    Project,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Project => "project",
        })
    }
}

/// One config file that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: Layer,
    pub path: PathBuf,
    /// Found, parsed and merged.
    pub loaded: bool,
}

/// Where the two layers live for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// `None` when no user config directory can be determined.
    pub user: Option<PathBuf>,
    pub project: PathBuf,
}

impl ConfigPaths {
    /// Resolve both paths. `config_dir` beats `QUIRE_CONFIG_DIR`, which beats
    /// the platform config directory; `project_dir` defaults to the cwd.
    pub fn discover(project_dir: Option<&Path>, config_dir: Option<&Path>) -> Self {
        let user = match config_dir {
            Some(dir) => Some(dir.to_path_buf()),
            None => user_config_dir(),
        }
        .map(|dir| dir.join(USER_CONFIG_FILE));
        let project = project_dir
            .unwrap_or_else(|| Path::new(""))
            .join(PROJECT_CONFIG_FILE);
        Self { user, project }
    }

    /// Layers in merge order.
    fn layers(&self) -> impl Iterator<Item = (Layer, &Path)> {
        self.user
            .as_deref()
            .map(|p| (Layer::User, p))
            .into_iter()
            .chain(std::iter::once((Layer::Project, self.project.as_path())))
    }
}

/// Merged configuration plus what went into it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: QuireConfig,
    /// Every layer checked, user first.
    pub sources: Vec<ConfigSource>,
    /// Unreadable layers and out-of-range values. Never fatal.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    fn empty() -> Self {
        Self {
            config: QuireConfig::new(),
            sources: Vec::with_capacity(2),
            warnings: Vec::new(),
        }
    }

    /// Paths of the layers that were merged.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }

    pub fn source(&self, layer: Layer) -> Option<&ConfigSource> {
        self.sources.iter().find(|s| s.layer == layer)
    }

    /// Merge one layer; a broken file becomes a warning and is skipped.
    fn apply(&mut self, layer: Layer, path: &Path) {
        let loaded = match read_layer(path) {
            Ok(Some(parsed)) => {
                self.config.merge(parsed);
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.warnings
                    .push(format!("Failed to load {layer} config {}: {e}", path.display()));
                false
            }
        };
        self.sources.push(ConfigSource {
            layer,
            path: path.to_path_buf(),
            loaded,
        });
    }
}

/// Discover and merge both layers from the default locations.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_from(&ConfigPaths::discover(project_dir, None))
}

/// Like [`load_config`] with an explicit user config directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    load_config_from(&ConfigPaths::discover(project_dir, config_dir))
}

/// Merge the layers at `paths`, then check the merged values.
pub fn load_config_from(paths: &ConfigPaths) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig::empty();
    for (layer, path) in paths.layers() {
        loaded.apply(layer, path);
    }
    if let Err(e) = loaded.config.validate() {
        loaded
            .warnings
            .push(format!("Merged configuration is invalid: {e}"));
    }
    Ok(loaded)
}

/// Parse one file with no layering.
pub fn load_config_file(path: &Path) -> Result<QuireConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    QuireConfig::from_toml(&contents)
}

/// `Ok(None)` when there is no file at `path`.
fn read_layer(path: &Path) -> Result<Option<QuireConfig>> {
    if path.is_file() {
        load_config_file(path).map(Some)
    } else {
        Ok(None)
    }
}

/// Write `config` as TOML, creating missing parent directories.
pub fn save_config(config: &QuireConfig, path: &Path) -> Result<()> {
    let contents = config.to_toml()?;
    let write_err = |target: &Path, source| ConfigError::WriteFile {
        path: target.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| write_err(path, e))
}

/// Path of the user layer, if a config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    ConfigPaths::discover(None, None).user
}

/// `QUIRE_CONFIG_DIR`, else `<platform config dir>/quire`.
pub fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os(CONFIG_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|d| d.join(APP_NAME)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
