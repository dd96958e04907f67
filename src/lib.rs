//! # disclosure-lens
//!
//! Analyse PDF disclosure filings with a language model and render the
//! markdown report as presentational HTML.
//!
//! ## Why this crate?
//!
//! Corporate filings are long, dense and formulaic. This crate pulls the
//! text layer out of the PDF, asks a model for a structured analysis under a
//! fixed prompt plus two classification labels, and turns the answer into an
//! HTML fragment with a stable set of `md-*` classes a stylesheet can target.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL; size + magic check
//!  ├─ 2. Extract  text layer via pdfium (spawn_blocking)
//!  ├─ 3. Analyse  token budget + one model call with retry/backoff
//!  ├─ 4. Polish   deterministic markdown cleanup
//!  └─ 5. Render   block parser → HTML renderer → inline formatter
//! ```
//!
//! The renderer ([`markdown`]) is usable on its own:
//!
//! ```rust
//! let html = disclosure_lens::markdown::to_html("## Summary\n\n**Net profit** rose 12%.");
//! assert!(html.contains(r#"<strong class="md-bold">Net profit</strong>"#));
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use disclosure_lens::{analyze, AnalysisConfig, DisclosureLabels};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = AnalysisConfig::default();
//!     let labels = DisclosureLabels::new("Major event report", "Capital increase");
//!     let output = analyze("filing.pdf", &labels, &config).await?;
//!     println!("{}", output.html);
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `disclosure-lens` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! disclosure-lens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod identity;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze, analyze_from_bytes, analyze_many, analyze_many_with, analyze_sync, analyze_to_file,
    inspect, Analyzer,
};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, RenderError};
pub use identity::Identity;
pub use markdown::{extract_plain_text, to_html, Block};
pub use output::{AnalysisOutput, AnalysisStats, DisclosureLabels, DocumentInfo};
pub use pipeline::extract::{ExtractedDocument, PdfiumExtractor, TextExtractor};
pub use pipeline::llm::{AnalysisGenerator, Generation, GenerationRequest, LlmGenerator};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use service::{AnalysisService, SavedAnalysis};
pub use store::{AnalysisRecord, AnalysisStore, MemoryStore, NewAnalysis};
