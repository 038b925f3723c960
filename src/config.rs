/// Configuration module for Vigilo.
///
/// This module provides:
/// - `AppConfig`, persisted as JSON in `config.json`
/// - `Paths`, the fixed locations of the lock file, the LaunchAgent plist
///   and the agent log
///
/// The configuration lives in the platform-specific application data
/// directory (`~/Library/Application Support/com.angluster.Vigilo/` on macOS)
/// and is optional: a missing or unreadable file means defaults.
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VigiloError};

/// launchd label, also the plist file stem.
pub const LAUNCH_AGENT_LABEL: &str = "com.angluster.vigilo";

const CONFIG_FILE: &str = "config.json";
const LOCK_FILE: &str = "vigilo.lock";
const LOG_FILE: &str = "vigilo.log";

/// User-editable settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Acquire the assertions as soon as the agent starts
    pub enable_on_launch: bool,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            enable_on_launch: true,
            log_filter: "info".to_string(),
        }
    }
}

/// Filesystem locations used by the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    pub lock_file: PathBuf,
    pub launch_agent: PathBuf,
    pub log_file: PathBuf,
}

impl Paths {
    /// Resolve the standard locations for the current user.
    pub fn resolve() -> Result<Self> {
        let base = BaseDirs::new().ok_or_else(|| {
            VigiloError::filesystem("~", std::io::Error::other("home directory not found"))
        })?;
        let data_dir = get_data_directory()?;
        Ok(Self::with_roots(base.home_dir(), &data_dir, &std::env::temp_dir()))
    }

    /// Build the layout from explicit roots.
    pub fn with_roots(home: &Path, data_dir: &Path, temp_dir: &Path) -> Self {
        Self {
            lock_file: temp_dir.join(LOCK_FILE),
            launch_agent: home
                .join("Library")
                .join("LaunchAgents")
                .join(format!("{}.plist", LAUNCH_AGENT_LABEL)),
            log_file: data_dir.join(LOG_FILE),
        }
    }
}

/// Get the application's data directory, creating it if needed
pub fn get_data_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("com", "angluster", "Vigilo").ok_or_else(|| {
        VigiloError::filesystem(
            "~",
            std::io::Error::other("failed to determine user data directory"),
        )
    })?;

    let data_dir = project_dirs.data_dir();
    fs::create_dir_all(data_dir).map_err(|e| VigiloError::filesystem(data_dir, e))?;

    Ok(data_dir.to_path_buf())
}

/// Load configuration from config.json
/// Returns defaults if the file doesn't exist or can't be parsed
pub fn load_config() -> AppConfig {
    let Ok(data_dir) = get_data_directory() else {
        return AppConfig::default();
    };
    load_config_from(&data_dir.join(CONFIG_FILE))
}

/// Load configuration from an explicit path, falling back to defaults
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }

    let Ok(contents) = fs::read_to_string(path) else {
        return AppConfig::default();
    };

    serde_json::from_str(&contents).unwrap_or_default()
}

/// Save configuration to an explicit path as pretty-printed JSON
#[cfg(test)]
fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| VigiloError::filesystem(path, std::io::Error::other(e)))?;

    fs::write(path, json).map_err(|e| VigiloError::filesystem(path, e))
}
