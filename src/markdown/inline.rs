//! Inline formatter: turns the markup left inside an [`InlineSpan`] into
//! HTML.
//!
//! Substitution is textual and shallow, not a recursive inline parser.
//! The raw span is first split on inline-code spans; code content is
//! escaped and emitted as-is. Every other segment is escaped, then:
//!
//! 1. links `[label](url)` are rendered and parked behind slot markers,
//!    so no later pass can touch a URL
//! 2. bold-italic `***text***`
//! 3. bold `**text**`
//! 4. italic `*text*` (safe only once bold has consumed the double stars)
//! 5. slot markers are swapped back for the rendered links
//!
//! Link labels get passes 2 to 4 on their own before they are parked.
//!
//! Unbalanced or nested markup is passed through unchanged or partially
//! converted; it never panics and every pass is a single linear scan.
//!
//! [`InlineSpan`]: crate::markdown::InlineSpan

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

static RE_BOLD_ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*\*(.+?)\*\*\*").unwrap());

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").unwrap());

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());

static RE_LINK_SLOT: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").unwrap());

/// Private-use characters that bracket a parked link's index.
const SLOT_OPEN: char = '\u{E000}';
const SLOT_CLOSE: char = '\u{E001}';

/// URL schemes that are never emitted as `href` targets.
const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Convert inline markup in `raw` to HTML.
///
/// Must run exactly once per raw span: the output is HTML, and escaping it
/// a second time would double-encode entities.
pub fn format_inline(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 32);
    let mut last = 0;

    for caps in RE_CODE_SPAN.captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&format_text(&raw[last..whole.start()]));
        out.push_str(r#"<code class="md-inline-code">"#);
        out.push_str(&escape_html(&caps[1]));
        out.push_str("</code>");
        last = whole.end();
    }
    out.push_str(&format_text(&raw[last..]));
    out
}

/// Escape a code-free segment and apply the link and emphasis passes.
fn format_text(segment: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }
    // Stray slot markers in the source would alias parked links.
    let escaped = escape_html(&segment.replace([SLOT_OPEN, SLOT_CLOSE], ""));

    let mut links: Vec<String> = Vec::new();
    let parked = RE_LINK.replace_all(&escaped, |caps: &Captures<'_>| {
        links.push(render_link(caps));
        format!("{SLOT_OPEN}{}{SLOT_CLOSE}", links.len() - 1)
    });
    let s = emphasize(&parked);
    if links.is_empty() {
        return s;
    }
    RE_LINK_SLOT
        .replace_all(&s, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| links.get(i).cloned())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Bold-italic, bold, then italic over already escaped text.
fn emphasize(escaped: &str) -> String {
    let s = RE_BOLD_ITALIC.replace_all(
        escaped,
        r#"<strong class="md-bold"><em class="md-italic">${1}</em></strong>"#,
    );
    let s = RE_BOLD.replace_all(&s, r#"<strong class="md-bold">${1}</strong>"#);
    RE_ITALIC
        .replace_all(&s, r#"<em class="md-italic">${1}</em>"#)
        .into_owned()
}

fn render_link(caps: &Captures<'_>) -> String {
    let label = emphasize(&caps[1]);
    let url = caps[2].trim();
    let lowered = url.to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
        return label;
    }
    format!(
        r#"<a href="{url}" class="md-link" target="_blank" rel="noopener noreferrer">{label}</a>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn plain_text_is_only_escaped() {
        assert_eq!(format_inline("revenue < cost"), "revenue &lt; cost");
    }

    #[test]
    fn bold_before_italic() {
        assert_eq!(
            format_inline("**a** and *b*"),
            r#"<strong class="md-bold">a</strong> and <em class="md-italic">b</em>"#
        );
    }

    #[test]
    fn triple_stars_nest_bold_and_italic() {
        assert_eq!(
            format_inline("***x***"),
            r#"<strong class="md-bold"><em class="md-italic">x</em></strong>"#
        );
        assert_eq!(
            format_inline("***a*** and **b**"),
            r#"<strong class="md-bold"><em class="md-italic">a</em></strong> and <strong class="md-bold">b</strong>"#
        );
    }

    #[test]
    fn stars_inside_link_url_are_kept() {
        assert_eq!(
            format_inline("[r](http://x/*a*/b)"),
            r#"<a href="http://x/*a*/b" class="md-link" target="_blank" rel="noopener noreferrer">r</a>"#
        );
        let html = format_inline("see [r](http://x/**a**/b) and *this*");
        assert!(html.contains(r#"href="http://x/**a**/b""#));
        assert!(html.ends_with(r#"and <em class="md-italic">this</em>"#));
    }

    #[test]
    fn link_label_and_surrounding_emphasis() {
        assert_eq!(
            format_inline("[**DART**](http://x)"),
            r#"<a href="http://x" class="md-link" target="_blank" rel="noopener noreferrer"><strong class="md-bold">DART</strong></a>"#
        );
        assert_eq!(
            format_inline("**[a](http://x)**"),
            r#"<strong class="md-bold"><a href="http://x" class="md-link" target="_blank" rel="noopener noreferrer">a</a></strong>"#
        );
    }

    #[test]
    fn slot_markers_in_source_are_dropped() {
        assert_eq!(format_inline("a\u{E000}0\u{E001}b"), "a0b");
    }

    #[test]
    fn link_opens_new_context_without_referrer() {
        let html = format_inline("[DART](https://dart.fss.or.kr)");
        assert_eq!(
            html,
            r#"<a href="https://dart.fss.or.kr" class="md-link" target="_blank" rel="noopener noreferrer">DART</a>"#
        );
    }

    #[test]
    fn script_links_lose_their_href() {
        assert_eq!(format_inline("[click](javascript:alert(1))"), "click)");
        assert_eq!(format_inline("[click]( JavaScript:void)"), "click");
    }

    #[test]
    fn code_span_content_is_not_formatted() {
        assert_eq!(
            format_inline("`**raw** <b>`"),
            r#"<code class="md-inline-code">**raw** &lt;b&gt;</code>"#
        );
    }

    #[test]
    fn code_span_between_formatted_text() {
        assert_eq!(
            format_inline("*x* `y` *z*"),
            r#"<em class="md-italic">x</em> <code class="md-inline-code">y</code> <em class="md-italic">z</em>"#
        );
    }

    #[test]
    fn unbalanced_markup_passes_through() {
        assert_eq!(format_inline("**open"), "**open");
        assert_eq!(format_inline("`open"), "`open");
        assert_eq!(format_inline("[label](unclosed"), "[label](unclosed");
    }

    #[test]
    fn emphasis_does_not_cross_lines() {
        assert_eq!(format_inline("*a\nb*"), "*a\nb*");
    }

    #[test]
    fn quotes_in_url_are_escaped() {
        let html = format_inline(r#"[x](http://a"onmouseover="b)"#);
        assert!(html.contains("&quot;onmouseover=&quot;"), "got: {html}");
    }
}
