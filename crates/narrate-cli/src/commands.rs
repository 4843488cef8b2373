//! Main commands enum and per-command arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config_commands::ConfigCommand;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Read a file (or stdin) aloud
    Read(ReadArgs),

    /// Show how text would be split into segments
    Chunks(ChunksArgs),

    /// View or change persisted reader settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show resolved configuration paths
    Paths,
}

/// Where the text comes from and how it is cleaned up.
#[derive(Args, Debug, Clone, Default)]
pub struct TextArgs {
    /// File to read; stdin when omitted
    pub file: Option<PathBuf>,

    /// Read the text as-is, without markdown clean-up
    #[arg(long)]
    pub raw: bool,

    /// Longest segment, in characters
    #[arg(long = "max-chunk", value_name = "N")]
    pub max_chunk: Option<usize>,

    /// Segments shorter than this are merged with a neighbour when they fit
    #[arg(long = "min-chunk", value_name = "N")]
    pub min_chunk: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReadArgs {
    #[command(flatten)]
    pub text: TextArgs,

    /// Voice name
    #[arg(long, env = "NARRATE_VOICE")]
    pub voice: Option<String>,

    /// Speaking rate, in (0, 4]
    #[arg(long, env = "NARRATE_SPEED")]
    pub speed: Option<f32>,

    /// Speech endpoint URL
    #[arg(long, env = "NARRATE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Synthesis model name
    #[arg(long, env = "NARRATE_MODEL")]
    pub model: Option<String>,

    /// Synthesise the whole text in a single request
    #[arg(long)]
    pub no_chunking: bool,

    /// Save the first synthesised chunk to this file
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,

    /// Write chunks to this directory instead of the sound card
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Give up on a segment after this many seconds
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<f64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChunksArgs {
    #[command(flatten)]
    pub text: TextArgs,

    /// Print segments as JSON
    #[arg(long)]
    pub json: bool,
}
