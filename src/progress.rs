//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as a document moves through reading, extraction, the model call
//! and rendering.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a terminal spinner, a WebSocket or a job
//! table without the library knowing how the host communicates. The trait
//! is `Send + Sync` because `analyze_many` runs several documents at once.
//!
//! # Example
//!
//! ```rust
//! use disclosure_lens::{AnalysisConfig, AnalysisProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AnalysisProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{stage} done in {elapsed_ms} ms");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A step of the analysis pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Resolving the input and validating the file.
    Reading,
    /// Pulling text out of the PDF.
    Extracting,
    /// Waiting on the language model.
    Analyzing,
    /// Post-processing and rendering the markdown.
    Rendering,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Reading,
        Stage::Extracting,
        Stage::Analyzing,
        Stage::Rendering,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Reading => "reading",
            Stage::Extracting => "extracting",
            Stage::Analyzing => "analyzing",
            Stage::Rendering => "rendering",
        })
    }
}

/// Called by the pipeline as a document moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `analyze_many`, events of different documents
/// interleave and may arrive from different threads.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called before the model call is retried.
    ///
    /// # Arguments
    /// * `attempt`: 1-indexed number of the retry about to run
    /// * `error`: human-readable description of the failure
    fn on_retry(&self, attempt: u32, error: &str) {
        let _ = (attempt, error);
    }

    /// Called once per document, after success or failure.
    fn on_analysis_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
