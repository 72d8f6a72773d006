//! Configuration and design-loading errors.
//!
//! Bridge and host errors live next to their modules
//! ([`crate::bridge::BridgeError`], [`crate::host::HostError`]).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration or design snapshots.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON for its format.
    #[error("failed to parse {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// File not found.
    #[error("file not found: {path}")]
    NotFound {
        /// Path where the file was expected.
        path: PathBuf,
    },

    /// Contents parsed but are inconsistent.
    #[error("validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}
