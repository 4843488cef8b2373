//! Paragraph-aware text segmentation.
//!
//! Splits text into segments bounded by [`SegmenterConfig::max_size`]
//! characters while keeping reading order:
//!
//! 1. Split on blank lines into paragraphs.
//! 2. Accumulate paragraphs (joined by a blank line) until the next one
//!    would overflow, then close the running chunk.
//! 3. A running chunk that is still too long is split at sentence
//!    boundaries and re-packed; the last piece stays open.
//! 4. Merge adjacent chunks while the result still fits.
//!
//! A single sentence longer than `max_size` is emitted as-is.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::Segment;
use crate::settings::SegmenterConfig;

/// Blank line (possibly containing whitespace) between paragraphs.
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex is valid"));

/// Terminal punctuation followed by whitespace.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("sentence regex is valid"));

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SENTENCE_SEPARATOR: &str = " ";

/// Length in characters (Unicode scalar values).
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split `text` into indexed segments.
///
/// Empty or whitespace-only input yields no segments.
#[must_use]
pub fn segment(text: &str, config: &SegmenterConfig) -> Vec<Segment> {
    split_chunks(text, config.max_size, config.min_size)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment::new(index, text))
        .collect()
}

/// Split `text` into ordered chunk strings.
#[must_use]
pub fn split_chunks(text: &str, max_size: usize, min_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut emitted: Vec<String> = Vec::new();
    let mut current = Chunk::default();

    for paragraph in PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let paragraph_len = char_len(paragraph);

        if !current.is_empty()
            && current.len + paragraph_len + PARAGRAPH_SEPARATOR.len() > max_size
        {
            emitted.push(current.take());
        }

        current.push(paragraph, paragraph_len, PARAGRAPH_SEPARATOR);

        if current.len > max_size {
            let mut pieces = pack_sentences(&current.text, max_size);
            let last = pieces.pop().unwrap_or_default();
            emitted.extend(pieces);
            current = Chunk::from(last);
        }
    }

    if !current.is_empty() {
        emitted.push(current.take());
    }

    let merged = merge_adjacent(emitted, max_size);

    tracing::trace!(
        segments = merged.len(),
        undersized = merged.iter().filter(|c| char_len(c) < min_size).count(),
        max_size,
        min_size,
        "Segmented text"
    );

    merged
}

/// Running chunk with its character length cached.
#[derive(Default)]
struct Chunk {
    text: String,
    len: usize,
}

impl Chunk {
    const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, piece: &str, piece_len: usize, separator: &str) {
        if !self.is_empty() {
            self.text.push_str(separator);
            self.len += separator.len();
        }
        self.text.push_str(piece);
        self.len += piece_len;
    }

    fn take(&mut self) -> String {
        self.len = 0;
        std::mem::take(&mut self.text)
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        let len = char_len(&text);
        Self { text, len }
    }
}

/// Split text into sentences, keeping terminal punctuation with its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Re-pack an oversized chunk into sentence-aligned pieces of at most
/// `max_size` characters. A sentence that alone exceeds the bound becomes
/// its own piece.
fn pack_sentences(text: &str, max_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = Chunk::default();

    for sentence in split_sentences(text) {
        let sentence_len = char_len(sentence);
        if !current.is_empty() && current.len + SENTENCE_SEPARATOR.len() + sentence_len > max_size
        {
            pieces.push(current.take());
        }
        current.push(sentence, sentence_len, SENTENCE_SEPARATOR);
    }

    if !current.is_empty() {
        pieces.push(current.take());
    }

    pieces
}

/// Merge neighbours whose combined length (with separator) fits `max_size`.
///
/// `max_size` is a hard ceiling here, so a chunk below the minimum size is
/// only merged when the result still fits.
fn merge_adjacent(chunks: Vec<String>, max_size: usize) -> Vec<String> {
    let mut merged = Vec::with_capacity(chunks.len());
    let mut current = Chunk::default();

    for chunk in chunks {
        let chunk_len = char_len(&chunk);
        if !current.is_empty()
            && current.len + PARAGRAPH_SEPARATOR.len() + chunk_len > max_size
        {
            merged.push(current.take());
        }
        current.push(&chunk, chunk_len, PARAGRAPH_SEPARATOR);
    }

    if !current.is_empty() {
        merged.push(current.take());
    }

    merged
}
