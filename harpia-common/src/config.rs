//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `HARPIA_ROOT_FOLDER`
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal: a warning is logged and built-in
//! defaults are used.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "HARPIA_ROOT_FOLDER";

/// Environment variable pointing at a TOML config file
pub const CONFIG_PATH_ENV: &str = "HARPIA_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "harpia.db";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves the data root folder from CLI, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command-line override (priority 1)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Value read from the TOML config (priority 3)
    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    /// Resolve the root folder, never failing
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!("Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            debug!("Root folder from TOML config: {}", path.display());
            return path.clone();
        }

        default_root_folder()
    }
}

/// Creates the root folder and locates files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    /// Path of the SQLite observation database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// OS-dependent default root folder
///
/// `~/.local/share/harpia` on Linux, the platform data dir elsewhere.
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("harpia"))
        .unwrap_or_else(|| PathBuf::from("./harpia_data"))
}

/// Locate the TOML config file
///
/// **Priority:** CLI → `HARPIA_CONFIG` → `<config dir>/harpia/config.toml`.
/// Returns `None` when no candidate is known; existence is checked by
/// [`load_toml_config`].
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("harpia").join("config.toml"))
}

/// Load a TOML config, falling back to defaults when the file is missing
///
/// Parse errors are reported: a file that exists but is malformed is a user
/// mistake worth surfacing.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No config file location available, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file not found at {}, using built-in defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// User-Agent sent to the public geodata services
///
/// Nominatim and Overpass ask clients to identify themselves.
pub fn get_user_agent() -> String {
    format!(
        "harpia/{} (harpy eagle nest survey tool)",
        env!("CARGO_PKG_VERSION")
    )
}
