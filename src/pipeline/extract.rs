//! Text extraction: pull the text layer out of a PDF.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. `tokio::task::spawn_blocking` moves the work onto the
//! blocking pool so Tokio worker threads never stall on a large filing.
//!
//! ## Why a trait?
//!
//! The analysis pipeline only needs "path in, text out". Putting that behind
//! [`TextExtractor`] lets tests substitute a fake and lets hosts plug in a
//! different engine without touching orchestration.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Text and page count of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Page texts joined by a newline, in page order.
    pub text: String,
    pub page_count: usize,
}

/// Turns a PDF on disk into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<ExtractedDocument, AnalysisError>;
}

/// [`TextExtractor`] backed by pdfium.
///
/// The library is bound per call, trying the configured path, then
/// `PDFIUM_LIB_PATH` (each a file or a directory), then the working
/// directory, then the system library.
#[derive(Debug, Default, Clone)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor honouring [`AnalysisConfig::pdfium_lib_path`].
    pub fn from_config(config: &AnalysisConfig) -> Self {
        match &config.pdfium_lib_path {
            Some(path) => Self::new().with_library_path(path.clone()),
            None => Self::new(),
        }
    }

    /// Bind to the library at `path` before any other location.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library_path.as_deref()
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<ExtractedDocument, AnalysisError> {
        let path = path.to_path_buf();
        let pwd = password.map(|s| s.to_string());
        let lib = self.library_path.clone();

        tokio::task::spawn_blocking(move || extract_blocking(lib.as_deref(), &path, pwd.as_deref()))
            .await
            .map_err(|e| AnalysisError::Internal(format!("Extraction task panicked: {}", e)))?
    }
}

fn extract_blocking(
    library_path: Option<&Path>,
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<ExtractedDocument, AnalysisError> {
    let pdfium = bind_pdfium(library_path)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| classify_load_error(pdf_path, password, &e))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF loaded: {} pages", page_count);

    let mut texts = Vec::with_capacity(page_count);
    for (idx, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(text) => texts.push(text.all()),
            // One unreadable page should not sink the whole filing.
            Err(e) => warn!("Page {}: text layer unavailable: {:?}", idx + 1, e),
        }
    }

    let text = texts.join("\n");
    debug!(
        "Extracted {} characters from {} pages",
        text.chars().count(),
        page_count
    );

    Ok(ExtractedDocument { text, page_count })
}

fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, AnalysisError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = explicit {
        candidates.push(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        if !env_path.is_empty() {
            candidates.push(PathBuf::from(env_path));
        }
    }
    candidates.push(PathBuf::from("./"));

    for candidate in candidates {
        let lib = if candidate.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&candidate)
        } else {
            candidate
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium at {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => debug!("pdfium not usable at {}: {:?}", lib.display(), e),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| AnalysisError::PdfiumBindingFailed(format!("{:?}", e)))
}

fn classify_load_error(path: &Path, password: Option<&str>, err: &PdfiumError) -> AnalysisError {
    let detail = format!("{:?}", err);
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            AnalysisError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            AnalysisError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        AnalysisError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}
