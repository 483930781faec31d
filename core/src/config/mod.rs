//! Configuration management
//!
//! All configuration types are exported from this module.

pub mod store;

pub use store::{Config, LoggingConfig, ProviderConfig, TrainingConfig, ValidationConfig};

use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "garden.toml";
pub const SESSION_FILE_NAME: &str = "session.json";
pub const LOG_FILE_NAME: &str = "debug.log";

/// Find the configuration file in standard locations
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(dir) = get_config_dir() {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Get the configuration directory path
pub fn get_config_dir() -> Option<PathBuf> {
    use dirs::config_dir;
    use home::home_dir;

    if let Some(dir) = config_dir() {
        return Some(dir.join("garden"));
    }

    if let Some(home) = home_dir() {
        return Some(home.join(".config").join("garden"));
    }

    None
}

/// Get the data directory path (sessions, logs)
pub fn get_data_dir() -> Option<PathBuf> {
    if let Some(dir) = dirs::data_dir() {
        return Some(dir.join("garden"));
    }

    home::home_dir().map(|home| home.join(".local").join("share").join("garden"))
}

/// Where the CLI keeps its session snapshot
pub fn default_session_path() -> Option<PathBuf> {
    get_data_dir().map(|dir| dir.join(SESSION_FILE_NAME))
}

/// Debug log location: configured file, else the data directory
pub fn log_path(config: &Config) -> Option<PathBuf> {
    config
        .logging
        .file
        .clone()
        .or_else(|| get_data_dir().map(|dir| dir.join(LOG_FILE_NAME)))
}
