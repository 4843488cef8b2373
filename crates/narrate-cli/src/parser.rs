//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Read text aloud through an OpenAI-compatible speech endpoint.
#[derive(Parser)]
#[command(name = "narrate")]
#[command(about = "Read long-form text aloud, chunk by chunk, in order")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
