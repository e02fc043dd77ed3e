// Configuration management module
// Handles TOML configuration loading, validation, and defaults

pub mod settings;

pub use settings::{Config, ConfigError, OpenRouterConfig, StorageConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("docrag"))
        .ok_or(ConfigError::DirectoryError)
}
