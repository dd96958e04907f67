//! Error types for the disclosure-lens library.
//!
//! Two error types reflect two distinct failure scopes:
//!
//! * [`AnalysisError`]: the analysis (or a store operation) cannot
//!   complete: bad input file, no extractable text, provider failure,
//!   missing identity. Returned as `Err(AnalysisError)` from the top-level
//!   `analyze*` functions and from [`crate::service::AnalysisService`].
//!
//! * [`RenderError`]: the HTML renderer met a block it cannot represent.
//!   It never escapes the crate's public pipeline: [`crate::markdown::to_html`]
//!   recovers it into an escaped plain-text fragment.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the disclosure-lens library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file is larger than the configured upload limit.
    #[error("PDF '{path}' is {size} bytes, above the {limit}-byte limit.\nRaise --max-file-size or split the document.")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The PDF yielded too little text to analyse (scanned image, empty form).
    #[error("No usable text in '{path}': {chars} characters extracted, at least {min} required.\nScanned documents need OCR before analysis.")]
    NoExtractableText {
        path: PathBuf,
        chars: usize,
        min: usize,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// Disclosure type or specific type is missing.
    #[error("Missing classification label: {field} must not be empty.\nProvide it with --{flag} <VALUE>.")]
    MissingClassification {
        field: &'static str,
        flag: &'static str,
    },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider rejected the request as too large for its context window.
    #[error("Document is too large for the model context: {detail}\nLower --max-input-tokens or split the document.")]
    DocumentTooLarge { detail: String },

    /// API returned an authentication error (401/403). Retry will not help.
    #[error("Authentication error from provider '{provider}': {detail}\nCheck the API key.")]
    AuthError { provider: String, detail: String },

    /// API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// API call timed out.
    #[error("API call timed out after {elapsed_ms}ms")]
    ApiTimeout { elapsed_ms: u64 },

    /// The LLM API returned any other error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The model answered with no content.
    #[error("LLM returned an empty analysis")]
    EmptyResponse,

    // ── Store errors ──────────────────────────────────────────────────────
    /// A store operation was attempted without an identity.
    #[error("Authentication required for this operation")]
    Unauthenticated,

    /// No record with this id exists for the caller.
    #[error("Analysis record '{id}' not found")]
    NotFound { id: String },

    /// The backing store failed.
    #[error("Analysis store error: {0}")]
    StoreError(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Whether a retry of the same LLM call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimitExceeded { .. }
                | AnalysisError::ApiTimeout { .. }
                | AnalysisError::LlmApiError { .. }
                | AnalysisError::EmptyResponse
        )
    }
}

/// Renderer failure; recovered by the fallback path.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("heading level {level} is outside 1..=6")]
    InvalidHeadingLevel { level: u8 },

    #[error("failed to write HTML: {0}")]
    Fmt(#[from] std::fmt::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_display_includes_limit() {
        let e = AnalysisError::FileTooLarge {
            path: "big.pdf".into(),
            size: 20_000_000,
            limit: 10_485_760,
        };
        let msg = e.to_string();
        assert!(msg.contains("20000000"), "got: {msg}");
        assert!(msg.contains("10485760"), "got: {msg}");
    }

    #[test]
    fn missing_classification_names_flag() {
        let e = AnalysisError::MissingClassification {
            field: "disclosure type",
            flag: "disclosure-type",
        };
        assert!(e.to_string().contains("--disclosure-type"));
    }

    #[test]
    fn transient_errors_are_retried() {
        assert!(AnalysisError::ApiTimeout { elapsed_ms: 10 }.is_transient());
        assert!(AnalysisError::RateLimitExceeded {
            provider: "openai".into(),
            retry_after_secs: None,
        }
        .is_transient());
        assert!(AnalysisError::EmptyResponse.is_transient());
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        assert!(!AnalysisError::AuthError {
            provider: "openai".into(),
            detail: "bad key".into(),
        }
        .is_transient());
        assert!(!AnalysisError::DocumentTooLarge {
            detail: "context".into()
        }
        .is_transient());
        assert!(!AnalysisError::Unauthenticated.is_transient());
    }

    #[test]
    fn render_error_from_fmt() {
        let e: RenderError = std::fmt::Error.into();
        assert!(matches!(e, RenderError::Fmt(_)));
    }
}
