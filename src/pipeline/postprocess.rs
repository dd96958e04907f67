//! Post-processing: deterministic cleanup of generated markdown.
//!
//! ## Why is post-processing necessary?
//!
//! Even a well-prompted model occasionally wraps the whole report in a
//! ` ```markdown ` fence, answers with `\r\n` line endings or leaks
//! zero-width characters copied from the source PDF. The block parser would
//! render a wrapped report as one code block, so these artefacts are fixed
//! here before the markdown is rendered or stored.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the fence rule sees `\n` only;
//! whitespace rules run after character removal so a line holding only a
//! zero-width space becomes blank and can be collapsed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip an outer markdown fence around the whole answer
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. Ensure the text ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer markdown fence ───────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*)\n```\s*$").unwrap());

/// Only a fence that encloses everything is stripped. An answer that opens
/// and closes with separate code blocks keeps its fences.
fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCE.captures(input.trim()) {
        let inner = &caps[1];
        if !inner.lines().any(|l| l.trim_start().starts_with("```")) {
            return inner.to_string();
        }
    }
    input.to_string()
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

// ── Rule 6: Ensure single final newline ──────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_markdown_fences("```markdown\n# Report\nBody\n```"), "# Report\nBody");
        assert_eq!(strip_markdown_fences("```\n# Report\n```\n"), "# Report");
    }

    #[test]
    fn test_separate_code_blocks_kept() {
        let input = "```\na\n```\ntext\n```\nb\n```";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_markdown_fences("# Report\nBody"), "# Report\nBody");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  a   \nb\t"), "  a\nb");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}"), "abc");
    }

    #[test]
    fn test_clean_markdown_full_pipeline() {
        let raw = "```markdown\r\n# Report  \r\n\r\n\u{200B}\r\n\r\n\r\n\r\nBody\r\n```";
        assert_eq!(clean_markdown(raw), "# Report\n\n\nBody\n");
    }
}
