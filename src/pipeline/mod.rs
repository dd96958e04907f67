//! Pipeline stages for disclosure analysis.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the collaborator-facing stages (`extract`, `llm`)
//! can be replaced behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ postprocess ──▶ markdown::to_html
//! (URL/path)  (pdfium)   (model)  (cleanup)        (render)
//! ```
//!
//! 1. [`input`]: canonicalise the path or URL to a validated local PDF
//! 2. [`extract`]: pull the text layer; runs in `spawn_blocking` because
//!    pdfium is blocking
//! 3. [`llm`]: budget the text, call the model with retry/backoff; the
//!    only stage with model I/O
//! 4. [`postprocess`]: deterministic cleanup of the model's markdown

pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
