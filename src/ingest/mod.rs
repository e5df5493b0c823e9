// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest content kept per item (Telegram caps a message at 4096 chars).
pub const MAX_CONTENT_CHARS: usize = 3500;

static RE_BREAKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p>").expect("valid break regex"));
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("valid tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\f\v\x{00A0}]+").expect("valid ws regex"));
static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n+").expect("valid blank-line regex"));

/// Turn feed HTML into plain text: tags stripped, entities decoded,
/// whitespace collapsed, length capped. Line breaks survive.
pub fn normalize_text(s: &str) -> String {
    // 1) Block breaks to newlines before the tags go away
    let out = RE_BREAKS.replace_all(s, "\n");

    // 2) Strip HTML tags
    let out = RE_TAGS.replace_all(&out, "");

    // 3) Entities after tags, so "&lt;b&gt;" stays literal text
    let out = html_escape::decode_html_entities(&out).to_string();

    // 4) Collapse whitespace
    let out = RE_WS.replace_all(&out, " ");
    let out = RE_BLANK_LINES.replace_all(&out, "\n\n");
    let mut out = out
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    // 5) Length cap
    if out.chars().count() > MAX_CONTENT_CHARS {
        out = out.chars().take(MAX_CONTENT_CHARS).collect();
        out.push('…');
    }

    out
}
