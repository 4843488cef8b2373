//! JSON-backed persistence for [`ReaderSettings`].

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{PathError, StoreError};
use crate::settings::{ReaderSettings, SettingsUpdate, validate_settings};

/// Reads and writes reader settings as pretty-printed JSON.
///
/// A missing file is not an error: [`load`](Self::load) falls back to
/// [`ReaderSettings::default`]. Unknown keys are ignored and absent keys
/// take their defaults, so older files keep loading.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store backed by the file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location (see [`super::settings_path`]).
    pub fn open_default() -> Result<Self, PathError> {
        Ok(Self::open(super::settings_path()?))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, or defaults when the file does not exist yet.
    pub fn load(&self) -> Result<ReaderSettings, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(ReaderSettings::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write settings, creating the parent directory if needed.
    pub fn save(&self, settings: &ReaderSettings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PathError::CreateFailed {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let json = serde_json::to_string_pretty(settings).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        fs::write(&self.path, json + "\n").map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }

    /// Load, apply `update`, save, and return the merged settings.
    ///
    /// The merged result is validated first; on failure the file on disk
    /// is left untouched.
    pub fn update(&self, update: &SettingsUpdate) -> Result<ReaderSettings, StoreError> {
        let mut settings = self.load()?;
        settings.merge(update);
        validate_settings(&settings)?;
        self.save(&settings)?;
        Ok(settings)
    }

    /// Remove the settings file. Missing files are fine.
    pub fn reset(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
