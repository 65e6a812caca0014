//! Configuration loading and root folder resolution
//!
//! Resolution priority for every value:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup; it is logged and
//! the remaining sources are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Optional values read from `config.toml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TomlConfig {
    /// Folder holding the database
    pub root_folder: Option<PathBuf>,
    /// HTTP control surface port
    pub port: Option<u16>,
    /// tracing EnvFilter directive (e.g. "info" or "orderbell_alert=debug")
    pub log_level: Option<String>,
    /// Startup-quiet window in milliseconds (0 disables it)
    pub startup_quiet_ms: Option<u64>,
    /// Arrival batching window in milliseconds
    pub batch_delay_ms: Option<u64>,
}

impl TomlConfig {
    /// Parse TOML content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load the platform config file if one exists
    ///
    /// Returns defaults (all `None`) when no file is found or it cannot be
    /// parsed.
    pub fn load_default() -> Self {
        let Some(path) = config_file_path() else {
            debug!("No config file found, using defaults");
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                debug!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &toml_config.root_folder {
        return root_folder.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the config file for the platform
///
/// Linux checks `~/.config/orderbell/config.toml` then
/// `/etc/orderbell/config.toml`; other platforms use the user config dir.
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("orderbell").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/orderbell/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("orderbell"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/orderbell"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("orderbell"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/orderbell"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("orderbell"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\orderbell"))
    } else {
        PathBuf::from("./orderbell_data")
    }
}

/// Database file inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join("orderbell.db")
}
