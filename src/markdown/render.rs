//! HTML renderer for the block model.
//!
//! Every block becomes one self-contained `md-block` container; nothing is
//! merged across blocks at this stage (the parser already did that). All
//! text goes through [`format_inline`] except code-block content, which is
//! only escaped.
//!
//! [`to_html`] is the entry point the pipeline uses. It cannot fail: when
//! rendering errors (or panics) the caller still receives a displayable
//! fragment holding the escaped source text.

use crate::error::RenderError;
use crate::markdown::block::{Block, InlineSpan, OrderedItem};
use crate::markdown::inline::{escape_html, format_inline};
use crate::markdown::parser::parse;
use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

const DOCUMENT_OPEN: &str = r#"<div class="md-document">"#;
const DOCUMENT_CLOSE: &str = "</div>";

/// Parse and render `markdown`, falling back to an escaped plain paragraph
/// if anything goes wrong.
pub fn to_html(markdown: &str) -> String {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let blocks = parse(markdown);
        debug!("Parsed {} markdown blocks", blocks.len());
        render(&blocks)
    }));

    match outcome {
        Ok(Ok(html)) => html,
        Ok(Err(e)) => {
            warn!("Markdown render failed, using plain fallback: {}", e);
            fallback_fragment(markdown)
        }
        Err(_) => {
            warn!("Markdown renderer panicked, using plain fallback");
            fallback_fragment(markdown)
        }
    }
}

/// Render `blocks`, substituting the escaped `source` text on failure.
pub fn render_with_fallback(source: &str, blocks: &[Block]) -> String {
    render(blocks).unwrap_or_else(|e| {
        warn!("Markdown render failed, using plain fallback: {}", e);
        fallback_fragment(source)
    })
}

/// Render a block sequence to an HTML fragment.
///
/// Blocks are emitted in sequence order. Fails only for blocks the parser
/// never produces, such as a heading level outside `1..=6`.
pub fn render(blocks: &[Block]) -> Result<String, RenderError> {
    let mut out = String::with_capacity(blocks.len() * 128 + 32);
    out.push_str(DOCUMENT_OPEN);
    out.push('\n');
    for block in blocks {
        render_block(block, &mut out)?;
        out.push('\n');
    }
    out.push_str(DOCUMENT_CLOSE);
    Ok(out)
}

/// The single-paragraph fragment used when rendering fails.
pub fn fallback_fragment(source: &str) -> String {
    format!(
        r#"{DOCUMENT_OPEN}<div class="md-block md-paragraph"><p>{}</p></div>{DOCUMENT_CLOSE}"#,
        with_line_breaks(&escape_html(source))
    )
}

fn render_block(block: &Block, out: &mut String) -> Result<(), RenderError> {
    match block {
        Block::Heading { level, text } => render_heading(*level, text, out),
        Block::Paragraph { text } => {
            write!(
                out,
                r#"<div class="md-block md-paragraph"><p>{}</p></div>"#,
                with_line_breaks(&format_inline(text.as_str()))
            )?;
            Ok(())
        }
        Block::OrderedList { items } => render_ordered(items, out),
        Block::UnorderedList { items } => render_unordered(items, out),
        Block::CodeBlock { raw_text } => {
            write!(
                out,
                r#"<div class="md-block md-code-block"><pre><code>{}</code></pre></div>"#,
                escape_html(raw_text)
            )?;
            Ok(())
        }
        Block::Divider => {
            out.push_str(r#"<div class="md-block md-divider-block"><hr class="md-divider"></div>"#);
            Ok(())
        }
        Block::Table { headers, rows } => render_table(headers, rows, out),
    }
}

/// Decoration class for a heading level.
fn section_class(level: u8) -> &'static str {
    match level {
        1 => "main-section",
        2 => "sub-section",
        _ => "detail-section",
    }
}

fn render_heading(level: u8, text: &InlineSpan, out: &mut String) -> Result<(), RenderError> {
    if !(1..=6).contains(&level) {
        return Err(RenderError::InvalidHeadingLevel { level });
    }
    write!(
        out,
        r#"<div class="md-block md-heading md-heading-{level} {section}"><h{level} class="md-heading-text">{text}</h{level}></div>"#,
        section = section_class(level),
        text = format_inline(text.as_str()),
    )?;
    Ok(())
}

fn render_ordered(items: &[OrderedItem], out: &mut String) -> Result<(), RenderError> {
    out.push_str(r#"<div class="md-block md-ordered-list">"#);
    // Positions are renumbered from 1; the source numbers are ignored.
    for (position, item) in (1..).zip(items) {
        write!(
            out,
            r#"<div class="md-list-item md-ordered-item"><span class="md-list-number">{position}</span><span class="md-list-text">{}</span></div>"#,
            format_inline(item.text.as_str())
        )?;
    }
    out.push_str("</div>");
    Ok(())
}

fn render_unordered(items: &[InlineSpan], out: &mut String) -> Result<(), RenderError> {
    out.push_str(r#"<div class="md-block md-unordered-list">"#);
    for item in items {
        write!(
            out,
            r#"<div class="md-list-item md-unordered-item"><span class="md-list-bullet"></span><span class="md-list-text">{}</span></div>"#,
            format_inline(item.as_str())
        )?;
    }
    out.push_str("</div>");
    Ok(())
}

fn render_table(
    headers: &[InlineSpan],
    rows: &[Vec<InlineSpan>],
    out: &mut String,
) -> Result<(), RenderError> {
    out.push_str(r#"<div class="md-block md-table"><table class="md-table-grid">"#);
    if !headers.is_empty() {
        out.push_str("<thead><tr>");
        for cell in headers {
            write!(out, "<th>{}</th>", format_inline(cell.as_str()))?;
        }
        out.push_str("</tr></thead>");
    }
    if !rows.is_empty() {
        out.push_str("<tbody>");
        for row in rows {
            out.push_str("<tr>");
            for cell in row {
                write!(out, "<td>{}</td>", format_inline(cell.as_str()))?;
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody>");
    }
    out.push_str("</table></div>");
    Ok(())
}

fn with_line_breaks(html: &str) -> String {
    html.replace('\n', "<br>\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_renders_empty_document() {
        assert_eq!(render(&[]).unwrap(), "<div class=\"md-document\">\n</div>");
    }

    #[test]
    fn heading_classes_by_level() {
        for (level, class) in [(1, "main-section"), (2, "sub-section"), (3, "detail-section"), (6, "detail-section")] {
            let html = render(&[Block::Heading {
                level,
                text: "T".into(),
            }])
            .unwrap();
            assert!(html.contains(class), "level {level}: {html}");
            assert!(html.contains(&format!("<h{level} ")), "level {level}: {html}");
        }
    }

    #[test]
    fn invalid_heading_level_is_an_error() {
        let err = render(&[Block::Heading {
            level: 9,
            text: "T".into(),
        }])
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidHeadingLevel { level: 9 }));
    }

    #[test]
    fn fallback_escapes_source() {
        let blocks = [Block::Heading {
            level: 0,
            text: "x".into(),
        }];
        let html = render_with_fallback("<b>raw</b>\nnext", &blocks);
        assert_eq!(
            html,
            "<div class=\"md-document\"><div class=\"md-block md-paragraph\"><p>&lt;b&gt;raw&lt;/b&gt;<br>\nnext</p></div></div>"
        );
    }

    #[test]
    fn paragraph_newlines_become_breaks() {
        let html = render(&[Block::Paragraph {
            text: "a\nb".into(),
        }])
        .unwrap();
        assert!(html.contains("<p>a<br>\nb</p>"), "got: {html}");
    }

    #[test]
    fn ordered_list_is_renumbered() {
        let html = render(&[Block::OrderedList {
            items: vec![
                OrderedItem {
                    number: 5,
                    text: "a".into(),
                },
                OrderedItem {
                    number: 9,
                    text: "b".into(),
                },
            ],
        }])
        .unwrap();
        assert!(html.contains(r#"<span class="md-list-number">1</span><span class="md-list-text">a</span>"#));
        assert!(html.contains(r#"<span class="md-list-number">2</span><span class="md-list-text">b</span>"#));
        assert!(!html.contains(">5<") && !html.contains(">9<"));
    }

    #[test]
    fn table_without_rows_has_no_body() {
        let html = render(&[Block::Table {
            headers: vec!["A".into()],
            rows: vec![],
        }])
        .unwrap();
        assert!(html.contains("<thead>"));
        assert!(!html.contains("<tbody>"));
    }

    #[test]
    fn divider_has_no_content() {
        let html = render(&[Block::Divider]).unwrap();
        assert!(html.contains(r#"<hr class="md-divider">"#));
    }

    #[test]
    fn to_html_never_fails_on_odd_input() {
        for src in ["", "```", "|", "**", "[](", "#", "1.", "- ", "\u{0}\u{FEFF}"] {
            let html = to_html(src);
            assert!(html.starts_with(DOCUMENT_OPEN), "input {src:?}");
        }
    }
}
