//! The `narrate` command-line reader.
//!
//! The binary in `main.rs` only parses arguments, sets up logging, and
//! dispatches; everything else lives here so it can be tested.

pub mod commands;
pub mod config_commands;
pub mod handlers;
pub mod parser;
pub mod utils;

// Re-export primary types for convenient access
pub use commands::{ChunksArgs, Commands, ReadArgs};
pub use config_commands::ConfigCommand;
pub use parser::Cli;
