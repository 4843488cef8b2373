//! Paths command handler.

use anyhow::Result;
use narrate_core::{config_dir, settings_path};

/// Print the resolved config directory and settings file as `key = value`.
pub fn execute() -> Result<()> {
    println!("config_dir = {}", config_dir()?.display());
    println!("settings_file = {}", settings_path()?.display());
    Ok(())
}
