//! Settings management subcommands.

use clap::Subcommand;

/// Config command variants.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the current settings
    Show,
    /// Update one or more settings
    Set {
        /// Speech endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
        /// Voice name
        #[arg(long)]
        voice: Option<String>,
        /// Speaking rate, in (0, 4]
        #[arg(long)]
        speed: Option<f32>,
        /// Synthesis model name
        #[arg(long)]
        model: Option<String>,
        /// Report the first synthesised chunk for saving
        #[arg(long)]
        record: Option<bool>,
        /// Split text into segments (false reads it in one request)
        #[arg(long)]
        chunking: Option<bool>,
    },
    /// Reset all settings to defaults
    Reset,
}
