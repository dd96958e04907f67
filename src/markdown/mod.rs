//! Markdown → presentational HTML.
//!
//! ## Why a purpose-built renderer?
//!
//! Generated analyses use a small, predictable markdown subset: headings,
//! paragraphs, flat lists, pipe tables, fenced code and dividers. A general
//! CommonMark engine would render them, but the output must carry a fixed
//! set of `md-*` classes (section decoration per heading level, list
//! markers, table grid) that a stylesheet targets. Owning the two stages
//! keeps that contract in one place:
//!
//! ```text
//! markdown ──▶ parser::parse ──▶ Vec<Block> ──▶ render::render ──▶ HTML
//!                                                    │
//!                                    inline::format_inline (per span)
//! ```
//!
//! Everything here is synchronous and pure; the compiled patterns are
//! immutable statics, so any number of threads may render at once.

pub mod block;
pub mod inline;
pub mod parser;
pub mod plain;
pub mod render;

pub use block::{Block, InlineSpan, OrderedItem};
pub use inline::{escape_html, format_inline};
pub use parser::parse;
pub use plain::extract_plain_text;
pub use render::{fallback_fragment, render, render_with_fallback, to_html};
