//! Path and settings-file error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving configuration paths.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the system config directory.
    #[error("Cannot determine system config directory")]
    NoConfigDir,

    /// An empty path was provided.
    #[error("Path cannot be empty")]
    EmptyPath,

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Errors from loading or saving the settings file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Path resolution failed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Reading or writing the file failed.
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but is not valid settings JSON.
    #[error("Settings file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The merged settings failed validation and were not written.
    #[error("Refusing to save invalid settings: {0}")]
    Invalid(#[from] crate::settings::SettingsError),
}
