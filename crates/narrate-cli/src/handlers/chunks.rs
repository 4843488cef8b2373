//! Chunks command handler: preview segmentation without synthesising.

use std::fmt::Write as _;

use anyhow::Result;
use narrate_core::{Segment, segment};

use crate::commands::ChunksArgs;
use crate::utils::input::{load_text, segmenter_config};

pub async fn execute(args: ChunksArgs) -> Result<()> {
    let config = segmenter_config(&args.text)?;
    let text = load_text(&args.text).await?;
    let segments = segment(&text, &config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&segments)?);
    } else {
        print!("{}", render(&segments));
    }
    Ok(())
}

const PREVIEW_CHARS: usize = 60;

/// One line per segment: index, length, and the start of the text.
pub fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        let preview: String = seg.text.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if seg.char_len() > PREVIEW_CHARS { "..." } else { "" };
        let _ = writeln!(
            out,
            "[{:>3}] {:>4} chars  {}{}",
            seg.index,
            seg.char_len(),
            preview.replace('\n', " "),
            ellipsis
        );
    }
    let _ = writeln!(out, "{} segment(s)", segments.len());
    out
}
