//! Command handlers.
//!
//! Each handler is a thin wrapper that turns parsed arguments into library
//! calls and formats the result for the terminal.

pub mod chunks;
pub mod config;
pub mod paths;
pub mod read;
