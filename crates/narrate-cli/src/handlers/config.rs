//! Config command handler.

use anyhow::Result;
use narrate_core::{ReaderSettings, SettingsStore, SettingsUpdate};

use crate::config_commands::ConfigCommand;

/// Execute the config command against the default settings file.
pub fn execute(command: ConfigCommand) -> Result<()> {
    let store = SettingsStore::open_default()?;
    execute_with(&store, command)
}

/// Execute the config command against `store`.
pub fn execute_with(store: &SettingsStore, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = store.load()?;
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigCommand::Set {
            endpoint,
            voice,
            speed,
            model,
            record,
            chunking,
        } => {
            let update = SettingsUpdate {
                endpoint_url: endpoint,
                voice,
                speed,
                model,
                record_output: record,
                chunking_enabled: chunking,
            };
            if update.is_empty() {
                println!("Nothing to update. See 'narrate config set --help'.");
                return Ok(());
            }
            let settings = apply_update(store, &update)?;
            println!("✓ Settings updated");
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigCommand::Reset => {
            store.reset()?;
            println!("✓ Settings reset to defaults");
        }
    }
    Ok(())
}

/// Merge `update` into the stored settings, refusing to save invalid ones.
pub fn apply_update(store: &SettingsStore, update: &SettingsUpdate) -> Result<ReaderSettings> {
    Ok(store.update(update)?)
}
