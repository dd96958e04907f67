//! Output types returned by the analysis entry points.

use crate::error::AnalysisError;
use crate::markdown::extract_plain_text;
use serde::{Deserialize, Serialize};

/// The two classification labels chosen by the uploader.
///
/// Both are forwarded verbatim to the model; neither may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureLabels {
    /// Broad disclosure category, e.g. "Major event report".
    pub disclosure_type: String,
    /// Narrower type within the category, e.g. "Capital increase".
    pub specific_type: String,
}

impl DisclosureLabels {
    pub fn new(disclosure_type: impl Into<String>, specific_type: impl Into<String>) -> Self {
        Self {
            disclosure_type: disclosure_type.into(),
            specific_type: specific_type.into(),
        }
    }

    /// Reject blank labels.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.disclosure_type.trim().is_empty() {
            return Err(AnalysisError::MissingClassification {
                field: "disclosure type",
                flag: "disclosure-type",
            });
        }
        if self.specific_type.trim().is_empty() {
            return Err(AnalysisError::MissingClassification {
                field: "specific type",
                flag: "specific-type",
            });
        }
        Ok(())
    }
}

/// Complete result of analysing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Display name of the analysed document.
    pub filename: String,
    pub labels: DisclosureLabels,
    /// Post-processed markdown returned by the model.
    pub markdown: String,
    /// `markdown` rendered to the `md-document` HTML fragment.
    pub html: String,
    pub page_count: usize,
    /// Size of the source PDF in bytes.
    pub file_size: u64,
    pub stats: AnalysisStats,
}

impl AnalysisOutput {
    /// The analysis with markdown markers stripped.
    pub fn plain_text(&self) -> String {
        extract_plain_text(&self.markdown)
    }
}

/// Token and timing figures for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Prompt tokens reported by the provider.
    pub input_tokens: usize,
    /// Completion tokens reported by the provider.
    pub output_tokens: usize,
    /// Local estimate of the document text size, before truncation.
    pub estimated_input_tokens: usize,
    /// Whether the document text was cut to fit the input budget.
    pub truncated: bool,
    pub extract_ms: u64,
    pub llm_ms: u64,
    pub total_ms: u64,
}

/// What [`crate::inspect`] learns about a document without calling a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub page_count: usize,
    pub file_size: u64,
    /// Characters of extracted text, after trimming.
    pub text_chars: usize,
    pub estimated_tokens: usize,
    /// Whether the text clears the configured minimum for analysis.
    pub analysable: bool,
}
