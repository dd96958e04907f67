//! Block model produced by the parser and consumed by the renderer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw text that still carries unresolved inline markup
/// (`**bold**`, `*italic*`, `[label](url)`, `` `code` ``).
///
/// A span is formatted exactly once, by the renderer. Feeding already
/// rendered HTML back through the formatter is not supported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InlineSpan(String);

impl InlineSpan {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        if !self.0.is_empty() {
            self.0.push('\n');
        }
        self.0.push_str(line);
    }
}

impl fmt::Display for InlineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InlineSpan {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InlineSpan {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for InlineSpan {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One entry of an ordered list, keeping the number written in the source.
///
/// The renderer ignores `number` and renumbers entries from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub number: u64,
    pub text: InlineSpan,
}

/// A structural unit of parsed markdown. Blocks never nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading {
        level: u8,
        text: InlineSpan,
    },
    /// Consecutive source lines joined with `\n`.
    Paragraph {
        text: InlineSpan,
    },
    OrderedList {
        items: Vec<OrderedItem>,
    },
    UnorderedList {
        items: Vec<InlineSpan>,
    },
    /// Verbatim fence content; never inline-formatted.
    CodeBlock {
        raw_text: String,
    },
    Divider,
    /// Rows may have a different cell count than `headers`.
    Table {
        headers: Vec<InlineSpan>,
        rows: Vec<Vec<InlineSpan>>,
    },
}

impl Block {
    /// Short name of the variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Heading { .. } => "heading",
            Block::Paragraph { .. } => "paragraph",
            Block::OrderedList { .. } => "ordered_list",
            Block::UnorderedList { .. } => "unordered_list",
            Block::CodeBlock { .. } => "code_block",
            Block::Divider => "divider",
            Block::Table { .. } => "table",
        }
    }
}
