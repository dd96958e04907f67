//! Markdown → plain text, for previews and search snippets.
//!
//! Independent of the block parser: markers are removed by pattern
//! replacement. Fenced code is removed first so the inline-code and
//! emphasis passes never see the fence backticks.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_FENCED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[-*+][ \t]+").unwrap());
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\.[ \t]+").unwrap());
static RE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>[ \t]+").unwrap());
static RE_DASH_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^--+$").unwrap());
static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Strip markdown markers from `markdown`, keeping the readable text.
pub fn extract_plain_text(markdown: &str) -> String {
    let text = markdown.replace("\r\n", "\n");
    let text = RE_FENCED.replace_all(&text, "");
    let text = RE_HEADING.replace_all(&text, "");
    let text = RE_BOLD.replace_all(&text, "$1");
    let text = RE_ITALIC.replace_all(&text, "$1");
    let text = RE_INLINE_CODE.replace_all(&text, "$1");
    let text = RE_LINK.replace_all(&text, "$1");
    let text = RE_BULLET.replace_all(&text, "");
    let text = RE_NUMBER.replace_all(&text, "");
    let text = RE_QUOTE.replace_all(&text, "");
    let text = RE_DASH_RULE.replace_all(&text, "");
    let text = RE_BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}
