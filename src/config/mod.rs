//! Configuration file loading and parsing.
//!
//! # Configuration File Locations
//!
//! 1. Path given on the command line; it must exist
//! 2. Default location, used only if present:
//!    - **Linux/macOS:** `~/.fusion360-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.fusion360-mcp\config.json`
//!
//! With neither, built-in defaults apply.
//!
//! # Example Configuration
//!
//! See `config/example-config.json` for a complete example.

mod settings;

pub use settings::{
    BridgeConfig, Config, LoggingConfig, ScreenshotConfig, MAX_SCREENSHOT_EDGE,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.fusion360-mcp/`
/// - **Windows:** `%USERPROFILE%\.fusion360-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".fusion360-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration.
///
/// An explicit `path` must exist. With `None`, the default location is used
/// if a file is there, and built-in defaults otherwise.
///
/// # Errors
///
/// Returns an error if:
/// - An explicit configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Fields are unknown or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => p,
            None => {
                tracing::debug!("No configuration file, using defaults");
                return Ok(Config::default());
            }
        },
    };

    load_config_file(&config_path)
}

/// Loads and validates one configuration file.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, malformed or invalid.
pub fn load_config_file(config_path: &Path) -> Result<Config, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound {
            path: config_path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    config.validate()?;
    tracing::debug!(path = %config_path.display(), "Loaded configuration");

    Ok(config)
}
