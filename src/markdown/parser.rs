//! Line-oriented block parser for LLM-generated markdown.
//!
//! This is deliberately not a CommonMark implementation. Analysis reports
//! come back from the model as flat, loosely formatted markdown, and the
//! parser only has to recognise the handful of constructs the prompt asks
//! for: headings, paragraphs, flat lists, pipe tables, fenced code and
//! dividers. Anything it does not recognise degrades to a paragraph, so
//! parsing can never fail.
//!
//! ## Rule order
//!
//! Each trimmed line is tested against the rules below; the first match
//! wins:
//!
//! 1. blank line
//! 2. heading `#`…`######`
//! 3. divider `---` / `***` / `___`
//! 4. ordered item `1. text`
//! 5. unordered item `- text`, `* text`, `+ text`
//! 6. code fence (consumes lines up to the closing fence)
//! 7. table row `| … |`
//! 8. paragraph (lines containing a backtick always land here)

use crate::markdown::block::{Block, InlineSpan, OrderedItem};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());

static RE_DIVIDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*_]{3,}$").unwrap());

static RE_ORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)\.\s+(.+)$").unwrap());

static RE_UNORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*+]\s+(.+)$").unwrap());

const FENCE: &str = "```";

/// Marker that identifies a table separator row (`|---|:---:|`).
const TABLE_SEPARATOR: &str = "---";

/// Parse markdown into an ordered sequence of blocks.
///
/// Never fails; the worst case for unrecognised input is a single
/// paragraph holding every non-blank line.
pub fn parse(markdown: &str) -> Vec<Block> {
    let lines: Vec<&str> = markdown
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    let mut ctx = ParseContext::default();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;

        if line.is_empty() {
            ctx.blank_line();
            continue;
        }

        if let Some(caps) = RE_HEADING.captures(line) {
            ctx.close_all();
            ctx.blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                text: InlineSpan::new(&caps[2]),
            });
            continue;
        }

        if RE_DIVIDER.is_match(line) {
            ctx.close_all();
            ctx.blocks.push(Block::Divider);
            continue;
        }

        if let Some(caps) = RE_ORDERED.captures(line) {
            // Absurdly long numbers saturate; the renderer renumbers anyway.
            let number = caps[1].parse::<u64>().unwrap_or(u64::MAX);
            ctx.push_ordered(number, &caps[2]);
            continue;
        }

        if let Some(caps) = RE_UNORDERED.captures(line) {
            ctx.push_unordered(&caps[1]);
            continue;
        }

        if line.starts_with(FENCE) {
            ctx.close_all();
            let start = i;
            while i < lines.len() && !lines[i].trim_start().starts_with(FENCE) {
                i += 1;
            }
            let raw_text = lines[start..i].join("\n");
            // Step over the closing fence when there is one.
            if i < lines.len() {
                i += 1;
            }
            ctx.blocks.push(Block::CodeBlock { raw_text });
            continue;
        }

        if line.starts_with('|') && line.ends_with('|') {
            ctx.push_table_row(line);
            continue;
        }

        // Lines with a backtick are not inspected for inline code here; they
        // are paragraph text like everything else that reaches this point.
        ctx.push_paragraph_line(line);
    }

    ctx.finish()
}

/// Split a `| a | b |` row into trimmed cells, dropping the empty slices
/// produced by the outer delimiters.
fn split_cells(row: &str) -> Vec<InlineSpan> {
    if row.len() < 2 {
        return Vec::new();
    }
    row[1..row.len() - 1]
        .split('|')
        .map(|cell| InlineSpan::new(cell.trim()))
        .collect()
}

/// Paragraph or table under construction.
#[derive(Debug)]
enum OpenBlock {
    Paragraph(InlineSpan),
    Table {
        headers: Option<Vec<InlineSpan>>,
        rows: Vec<Vec<InlineSpan>>,
    },
}

impl OpenBlock {
    fn into_block(self) -> Block {
        match self {
            OpenBlock::Paragraph(text) => Block::Paragraph { text },
            OpenBlock::Table { headers, rows } => Block::Table {
                headers: headers.unwrap_or_default(),
                rows,
            },
        }
    }
}

/// List under construction.
#[derive(Debug)]
enum OpenList {
    Ordered(Vec<OrderedItem>),
    Unordered(Vec<InlineSpan>),
}

impl OpenList {
    fn into_block(self) -> Block {
        match self {
            OpenList::Ordered(items) => Block::OrderedList { items },
            OpenList::Unordered(items) => Block::UnorderedList { items },
        }
    }
}

/// Running parse state. Opening one kind of block always closes the other,
/// so at most one of `current` and `list` is populated and flushing them
/// keeps source order.
#[derive(Debug, Default)]
struct ParseContext {
    blocks: Vec<Block>,
    current: Option<OpenBlock>,
    list: Option<OpenList>,
}

impl ParseContext {
    fn close_current(&mut self) {
        if let Some(open) = self.current.take() {
            self.blocks.push(open.into_block());
        }
    }

    fn close_list(&mut self) {
        if let Some(list) = self.list.take() {
            self.blocks.push(list.into_block());
        }
    }

    fn close_all(&mut self) {
        self.close_current();
        self.close_list();
    }

    /// Blank lines end paragraphs only. Lists and tables stay open until a
    /// different block starts, so loosely spaced items form one list.
    fn blank_line(&mut self) {
        if matches!(self.current, Some(OpenBlock::Paragraph(_))) {
            self.close_current();
        }
    }

    fn push_ordered(&mut self, number: u64, text: &str) {
        self.close_current();
        if !matches!(self.list, Some(OpenList::Ordered(_))) {
            self.close_list();
            self.list = Some(OpenList::Ordered(Vec::new()));
        }
        if let Some(OpenList::Ordered(items)) = self.list.as_mut() {
            items.push(OrderedItem {
                number,
                text: InlineSpan::new(text),
            });
        }
    }

    fn push_unordered(&mut self, text: &str) {
        self.close_current();
        if !matches!(self.list, Some(OpenList::Unordered(_))) {
            self.close_list();
            self.list = Some(OpenList::Unordered(Vec::new()));
        }
        if let Some(OpenList::Unordered(items)) = self.list.as_mut() {
            items.push(InlineSpan::new(text));
        }
    }

    fn push_table_row(&mut self, line: &str) {
        self.close_list();
        if !matches!(self.current, Some(OpenBlock::Table { .. })) {
            self.close_current();
            self.current = Some(OpenBlock::Table {
                headers: None,
                rows: Vec::new(),
            });
        }
        if line.contains(TABLE_SEPARATOR) {
            return;
        }
        if let Some(OpenBlock::Table { headers, rows }) = self.current.as_mut() {
            let cells = split_cells(line);
            match headers {
                None => *headers = Some(cells),
                Some(_) => rows.push(cells),
            }
        }
    }

    fn push_paragraph_line(&mut self, line: &str) {
        if let Some(OpenBlock::Paragraph(text)) = self.current.as_mut() {
            text.push_line(line);
            return;
        }
        self.close_all();
        self.current = Some(OpenBlock::Paragraph(InlineSpan::new(line)));
    }

    fn finish(mut self) -> Vec<Block> {
        self.close_all();
        self.blocks
    }
}
