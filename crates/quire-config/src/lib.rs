//! Configuration system for the Quire workspace engine.
//!
//! Provides TOML-based configuration with:
//! - Storage settings (`[storage]`)
//! - Tree, history and search limits (`[tree]`, `[history]`, `[search]`)
//! - Staging review policy (`[staging]`)
//! - Artifact naming policy (`[naming]`)
//! - Config file layering (XDG user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod paths;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_from, load_config_with_options, save_config,
    user_config_dir, user_config_path, ConfigPaths, ConfigSource, Layer, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use paths::{default_data_dir, StorageConfig};
pub use types::*;
