//! Reading the text to narrate and interactive playback controls.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use narrate_core::{SegmenterConfig, normalize, validate_segmenter};
use tokio::io::AsyncReadExt;

use crate::commands::TextArgs;

/// Read the whole file, or stdin when no file is given.
pub async fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read text from stdin")?;
            Ok(text)
        }
    }
}

/// Load the text and clean it up for speech unless `--raw` was given.
pub async fn load_text(args: &TextArgs) -> Result<String> {
    let text = read_source(args.file.as_deref()).await?;
    Ok(if args.raw { text } else { normalize(&text) })
}

/// Segment bounds from the flags, falling back to the defaults.
pub fn segmenter_config(args: &TextArgs) -> Result<SegmenterConfig> {
    let defaults = SegmenterConfig::default();
    let config = SegmenterConfig {
        max_size: args.max_chunk.unwrap_or(defaults.max_size),
        min_size: args
            .min_chunk
            .unwrap_or_else(|| defaults.min_size.min(args.max_chunk.unwrap_or(defaults.max_size))),
    };
    validate_segmenter(&config)?;
    Ok(config)
}

/// A line typed on stdin while a file is being read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    Pause,
    Resume,
    Stop,
    Seek(Duration),
    Time,
    Stats,
}

/// Parse a control line: `p`, `r`, `s`, `t`, `stats`, or `seek <secs>`.
pub fn parse_control(line: &str) -> Option<Control> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_ascii_lowercase();
    match command.as_str() {
        "p" | "pause" => Some(Control::Pause),
        "r" | "resume" => Some(Control::Resume),
        "s" | "stop" | "q" => Some(Control::Stop),
        "t" | "time" => Some(Control::Time),
        "stats" => Some(Control::Stats),
        "seek" => {
            let secs: f64 = words.next()?.parse().ok()?;
            Duration::try_from_secs_f64(secs).ok().map(Control::Seek)
        }
        _ => None,
    }
}
