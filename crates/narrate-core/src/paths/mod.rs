//! Configuration paths and the persisted settings file.
//!
//! Resolution order for the configuration directory:
//! 1. `NARRATE_CONFIG_DIR` environment variable (highest priority)
//! 2. System config directory (e.g., `~/.config/narrate`)

mod error;
mod store;

use std::path::PathBuf;

pub use error::{PathError, StoreError};
pub use store::SettingsStore;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "NARRATE_CONFIG_DIR";

/// File name of the persisted settings inside the config directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

const APP_DIR_NAME: &str = "narrate";

/// Directory holding narrate's configuration.
pub fn config_dir() -> Result<PathBuf, PathError> {
    resolve_config_dir(std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from), dirs::config_dir())
}

/// Location of the persisted settings file.
pub fn settings_path() -> Result<PathBuf, PathError> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

/// Pick the config directory from an explicit override or the platform default.
fn resolve_config_dir(
    override_dir: Option<PathBuf>,
    system_dir: Option<PathBuf>,
) -> Result<PathBuf, PathError> {
    if let Some(dir) = override_dir {
        if dir.as_os_str().is_empty() {
            return Err(PathError::EmptyPath);
        }
        return Ok(dir);
    }

    system_dir
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(PathError::NoConfigDir)
}
