//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Largest screenshot edge accepted, in pixels.
pub const MAX_SCREENSHOT_EDGE: u32 = 8192;

/// Root configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Main-thread bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Default viewport capture size.
    #[serde(default)]
    pub screenshot: ScreenshotConfig,

    /// Design snapshot loaded into the simulated host; the bundled sample
    /// design is used when unset.
    #[serde(default)]
    pub design_path: Option<PathBuf>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "bridge.timeout_secs must be greater than 0".to_string(),
            });
        }

        for (field, value) in [
            ("width", self.screenshot.width),
            ("height", self.screenshot.height),
        ] {
            if !(1..=MAX_SCREENSHOT_EDGE).contains(&value) {
                return Err(ConfigError::ValidationError {
                    message: format!(
                        "screenshot.{field} must be between 1 and {MAX_SCREENSHOT_EDGE}, got {value}"
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Main-thread bridge settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Seconds a caller waits for the main thread before giving up.
    /// Default: 300
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BridgeConfig {
    /// The caller timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    crate::bridge::DEFAULT_TIMEOUT.as_secs()
}

/// Default viewport capture size.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenshotConfig {
    /// Width in pixels. Default: 1920
    #[serde(default = "default_width")]
    pub width: u32,

    /// Height in pixels. Default: 1080
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

const fn default_width() -> u32 {
    1920
}

const fn default_height() -> u32 {
    1080
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
