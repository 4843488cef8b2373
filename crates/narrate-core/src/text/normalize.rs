//! Markdown-ish text → speakable plain text.
//!
//! Handles:
//! - Fenced code blocks → "Code block omitted."
//! - Headings, blockquotes, list markers → text only
//! - Bold / italic / strikethrough → text only
//! - Links `[text](url)` → text, images `![alt](url)` → "image: alt"
//! - Inline code → contents
//! - HTML tags → removed, common entities decoded
//! - Bare URLs → "Example dot com link"
//! - `&`, `$`, `%` → words
//! - Horizontal rules → removed
//!
//! Blank lines between paragraphs survive as `"\n\n"` so the segmenter can
//! still split on them. Whitespace inside a paragraph collapses to single
//! spaces.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::{Host, Url};

const CODE_BLOCK_PLACEHOLDER: &str = "Code block omitted.";

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("image regex is valid"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("link regex is valid"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("inline code regex is valid"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(.+?)\*\*|__(.+?)__|~~(.+?)~~").expect("bold regex is valid")
});
static ITALIC_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s][^*]*)\*").expect("italic regex is valid"));
// `_x_` only counts as emphasis at word boundaries, so `snake_case` survives.
static ITALIC_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w])_([^_\s][^_]*)_([^\w]|$)").expect("underscore regex is valid")
});
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("html regex is valid"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\[\]]+").expect("url regex is valid"));
static REPEATED_DOTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{2,}|…").expect("dots regex is valid"));
static ORDERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s+").expect("ordered list regex is valid"));

/// Normalise text for speech, keeping paragraph boundaries.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_code_block = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            if !in_code_block {
                push_words(&mut current, CODE_BLOCK_PLACEHOLDER);
            }
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraphs, &mut current);
            continue;
        }

        if is_horizontal_rule(trimmed) {
            continue;
        }

        let is_heading = trimmed.starts_with('#');
        push_words(&mut current, &normalize_line(trimmed));

        // Headings read as their own sentence.
        if is_heading && !current.is_empty() {
            flush_paragraph(&mut paragraphs, &mut current);
        }
    }

    flush_paragraph(&mut paragraphs, &mut current);
    paragraphs.join("\n\n")
}

/// Strip inline markdown and symbols from a single trimmed line.
fn normalize_line(line: &str) -> String {
    let mut s = line;

    while let Some(rest) = s.strip_prefix('>') {
        s = rest.trim_start();
    }
    if s.starts_with('#') {
        s = s.trim_start_matches('#').trim_start();
    }

    let s = strip_list_marker(s);
    let s = IMAGE.replace_all(s, |caps: &Captures| {
        let alt = caps[1].trim();
        if alt.is_empty() {
            String::new()
        } else {
            format!("image: {alt}")
        }
    });
    let s = LINK.replace_all(&s, "$1");
    let s = INLINE_CODE.replace_all(&s, "$1");
    let s = BOLD.replace_all(&s, "$1$2$3");
    let s = ITALIC_STAR.replace_all(&s, "$1");
    let s = ITALIC_UNDERSCORE.replace_all(&s, "$1$2$3");
    let s = HTML_TAG.replace_all(&s, " ");
    let s = decode_entities(&s);
    let s = URL.replace_all(&s, |caps: &Captures| speakable_url(&caps[0]));
    let s = replace_symbols(&s);
    REPEATED_DOTS.replace_all(&s, ".").into_owned()
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
        .or_else(|| line.strip_prefix("• "))
    {
        return rest.trim_start();
    }

    ORDERED_MARKER
        .find(line)
        .map_or(line, |m| &line[m.end()..])
}

fn is_horizontal_rule(line: &str) -> bool {
    let chars: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    chars.len() >= 3
        && matches!(chars[0], '-' | '*' | '_')
        && chars.iter().all(|&c| c == chars[0])
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn replace_symbols(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str(" and "),
            '$' => out.push_str(" dollars "),
            '%' => out.push_str(" percent "),
            '|' | '*' | '~' | '`' | '^' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Describe a URL by its registrable name, e.g. `https://www.example.com/a`
/// → `Example dot com link`.
fn speakable_url(raw: &str) -> String {
    // Sentence punctuation directly after a URL is not part of it.
    let url = raw.trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']);
    let trailing = &raw[url.len()..];

    let described = match Url::parse(url).ok().as_ref().and_then(Url::host) {
        Some(Host::Domain(domain)) => describe_domain(domain),
        _ => None,
    };

    format!(
        "{}{trailing}",
        described.unwrap_or_else(|| "web link".to_string())
    )
}

fn describe_domain(domain: &str) -> Option<String> {
    let mut labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() > 2 && labels[0].eq_ignore_ascii_case("www") {
        labels.remove(0);
    }

    let tld = *labels.last()?;
    let name = if labels.len() >= 2 {
        labels[labels.len() - 2]
    } else {
        labels[0]
    };

    let mut chars = name.chars();
    let first = chars.next()?;
    let capitalised: String = first.to_uppercase().chain(chars).collect();

    Some(format!("{capitalised} dot {tld} link"))
}

fn push_words(paragraph: &mut String, text: &str) {
    for word in text.split_whitespace() {
        if !paragraph.is_empty() {
            paragraph.push(' ');
        }
        paragraph.push_str(word);
    }
}

fn flush_paragraph(paragraphs: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        paragraphs.push(std::mem::take(current));
    }
}
