//! Analysis entry points.
//!
//! [`Analyzer`] ties the collaborators together: a [`TextExtractor`], an
//! [`AnalysisGenerator`] and the [`AnalysisConfig`]. The free functions
//! (`analyze`, `analyze_from_bytes`, …) build the default analyzer (pdfium
//! plus an edgequake-llm provider) for one-shot use.
//!
//! ## Stage order
//!
//! ```text
//! Reading ──▶ Extracting ──▶ Analyzing ──▶ Rendering
//! (resolve,     (pdfium,       (budget,      (cleanup,
//!  validate)     min length)    model call)   to_html)
//! ```
//!
//! Labels are validated before any I/O so a missing classification never
//! costs a download or a model call.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::markdown;
use crate::output::{AnalysisOutput, AnalysisStats, DisclosureLabels, DocumentInfo};
use crate::pipeline::extract::{ExtractedDocument, PdfiumExtractor, TextExtractor};
use crate::pipeline::input::{self, display_filename, ResolvedInput};
use crate::pipeline::llm::{estimate_tokens, AnalysisGenerator, GenerationRequest, LlmGenerator};
use crate::pipeline::postprocess;
use crate::progress::{ProgressCallback, Stage};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs the analysis pipeline with a fixed set of collaborators.
#[derive(Clone)]
pub struct Analyzer {
    extractor: Arc<dyn TextExtractor>,
    generator: Arc<dyn AnalysisGenerator>,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        generator: Arc<dyn AnalysisGenerator>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            extractor,
            generator,
            config,
        }
    }

    /// pdfium extraction plus the provider resolved from `config`.
    pub async fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let generator = LlmGenerator::from_config(config).await?;
        Ok(Self::new(
            Arc::new(PdfiumExtractor::from_config(config)),
            Arc::new(generator),
            config.clone(),
        ))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse a local file or HTTP(S) URL.
    pub async fn analyze_path(
        &self,
        input_str: &str,
        labels: &DisclosureLabels,
    ) -> Result<AnalysisOutput, AnalysisError> {
        self.finish(self.run(Source::Input(input_str), labels).await)
    }

    /// Analyse an uploaded PDF held in memory.
    ///
    /// `upload_name` is the client-supplied file name, possibly
    /// percent-encoded; it only affects [`AnalysisOutput::filename`].
    pub async fn analyze_bytes(
        &self,
        bytes: &[u8],
        upload_name: &str,
        labels: &DisclosureLabels,
    ) -> Result<AnalysisOutput, AnalysisError> {
        self.finish(self.run(Source::Bytes { bytes, upload_name }, labels).await)
    }

    /// Extract without calling the model.
    pub async fn inspect_path(&self, input_str: &str) -> Result<DocumentInfo, AnalysisError> {
        let resolved = self.resolve(input_str).await?;
        let doc = self
            .extractor
            .extract(resolved.path(), self.config.password.as_deref())
            .await?;
        Ok(document_info(&resolved, &doc, self.config.min_text_chars))
    }

    fn finish(
        &self,
        result: Result<AnalysisOutput, AnalysisError>,
    ) -> Result<AnalysisOutput, AnalysisError> {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_complete(result.is_ok());
        }
        result
    }

    async fn resolve(&self, input_str: &str) -> Result<ResolvedInput, AnalysisError> {
        input::resolve_input(
            input_str,
            self.config.download_timeout_secs,
            self.config.max_file_size,
        )
        .await
    }

    async fn run(
        &self,
        source: Source<'_>,
        labels: &DisclosureLabels,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let total_start = Instant::now();
        labels.validate()?;
        let cb = self.config.progress_callback.as_ref();

        // ── Step 1: Resolve input ────────────────────────────────────────
        let stage = StageTimer::start(cb, Stage::Reading);
        // `_upload` keeps the temp file alive until extraction is done.
        let (resolved, raw_name, _upload) = match source {
            Source::Input(s) => {
                let resolved = self.resolve(s).await?;
                let name = resolved.source_name().to_string();
                (resolved, name, None)
            }
            Source::Bytes { bytes, upload_name } => {
                let tmp = write_temp_pdf(bytes)?;
                let resolved = self.resolve(&tmp.path().to_string_lossy()).await?;
                (resolved, upload_name.to_string(), Some(tmp))
            }
        };
        let filename = display_filename(&raw_name, today());
        stage.complete();
        info!("Analysing '{}' ({} bytes)", filename, resolved.size());

        // ── Step 2: Extract text ─────────────────────────────────────────
        let stage = StageTimer::start(cb, Stage::Extracting);
        let doc = self
            .extractor
            .extract(resolved.path(), self.config.password.as_deref())
            .await?;
        let chars = doc.text.trim().chars().count();
        if chars < self.config.min_text_chars {
            return Err(AnalysisError::NoExtractableText {
                path: resolved.path().to_path_buf(),
                chars,
                min: self.config.min_text_chars,
            });
        }
        let extract_ms = stage.complete();
        debug!("{} pages, {} characters of text", doc.page_count, chars);

        // ── Step 3: Model call ───────────────────────────────────────────
        let stage = StageTimer::start(cb, Stage::Analyzing);
        let request = GenerationRequest::for_document(&doc.text, labels, &self.config);
        let generation = self.generator.generate(&request).await?;
        let llm_ms = stage.complete();

        // ── Step 4: Clean up and render ──────────────────────────────────
        let stage = StageTimer::start(cb, Stage::Rendering);
        let markdown = postprocess::clean_markdown(&generation.markdown);
        let html = markdown::to_html(&markdown);
        stage.complete();

        let stats = AnalysisStats {
            input_tokens: generation.input_tokens,
            output_tokens: generation.output_tokens,
            estimated_input_tokens: request.estimated_input_tokens,
            truncated: request.truncated,
            extract_ms,
            llm_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Analysis of '{}' complete: {} in / {} out tokens, {}ms total",
            filename, stats.input_tokens, stats.output_tokens, stats.total_ms
        );

        Ok(AnalysisOutput {
            filename,
            labels: labels.clone(),
            markdown,
            html,
            page_count: doc.page_count,
            file_size: resolved.size(),
            stats,
        })
    }
}

enum Source<'a> {
    Input(&'a str),
    Bytes { bytes: &'a [u8], upload_name: &'a str },
}

/// Emits start/complete events and measures the stage.
struct StageTimer<'a> {
    cb: Option<&'a ProgressCallback>,
    stage: Stage,
    start: Instant,
}

impl<'a> StageTimer<'a> {
    fn start(cb: Option<&'a ProgressCallback>, stage: Stage) -> Self {
        if let Some(cb) = cb {
            cb.on_stage_start(stage);
        }
        Self {
            cb,
            stage,
            start: Instant::now(),
        }
    }

    fn complete(self) -> u64 {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        if let Some(cb) = self.cb {
            cb.on_stage_complete(self.stage, elapsed_ms);
        }
        elapsed_ms
    }
}

fn document_info(
    resolved: &ResolvedInput,
    doc: &ExtractedDocument,
    min_text_chars: usize,
) -> DocumentInfo {
    let text_chars = doc.text.trim().chars().count();
    DocumentInfo {
        filename: display_filename(resolved.source_name(), today()),
        page_count: doc.page_count,
        file_size: resolved.size(),
        text_chars,
        estimated_tokens: estimate_tokens(&doc.text),
        analysable: text_chars >= min_text_chars,
    }
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn write_temp_pdf(bytes: &[u8]) -> Result<tempfile::NamedTempFile, AnalysisError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| AnalysisError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| AnalysisError::Internal(format!("tempfile write: {e}")))?;
    Ok(tmp)
}

// ── Free functions ───────────────────────────────────────────────────────

/// Analyse a PDF file or URL with the default collaborators.
///
/// # Errors
/// Any [`AnalysisError`]: unreadable input, too little text, missing
/// labels, or a provider failure that survived the retries.
pub async fn analyze(
    input_str: impl AsRef<str>,
    labels: &DisclosureLabels,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    Analyzer::from_config(config)
        .await?
        .analyze_path(input_str.as_ref(), labels)
        .await
}

/// Analyse PDF bytes in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed on
/// return.
///
/// # Example
/// ```rust,no_run
/// use disclosure_lens::{analyze_from_bytes, AnalysisConfig, DisclosureLabels};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("filing.pdf")?;
/// let labels = DisclosureLabels::new("Major event report", "Capital increase");
/// let output = analyze_from_bytes(&bytes, "filing.pdf", &labels, &AnalysisConfig::default()).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn analyze_from_bytes(
    bytes: &[u8],
    upload_name: &str,
    labels: &DisclosureLabels,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    Analyzer::from_config(config)
        .await?
        .analyze_bytes(bytes, upload_name, labels)
        .await
}

/// Analyse a PDF and write the result to `output_path`.
///
/// A `.html` / `.htm` target receives the rendered fragment, anything else
/// the markdown. Uses atomic write (temp file + rename).
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    labels: &DisclosureLabels,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisStats, AnalysisError> {
    let output = analyze(input_str, labels, config).await?;
    let path = output_path.as_ref();
    let is_html = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    );
    let body = if is_html { &output.html } else { &output.markdown };
    write_atomic(path, body).await?;
    Ok(output.stats)
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), AnalysisError> {
    let write_err = |e: std::io::Error| AnalysisError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    labels: &DisclosureLabels,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, labels, config))
}

/// Analyse several documents, at most `config.concurrency` at a time.
///
/// One result per input, in input order. The provider is resolved once; if
/// that fails every entry carries the error.
pub async fn analyze_many(
    inputs: &[String],
    labels: &DisclosureLabels,
    config: &AnalysisConfig,
) -> Vec<Result<AnalysisOutput, AnalysisError>> {
    match Analyzer::from_config(config).await {
        Ok(analyzer) => analyze_many_with(&analyzer, inputs, labels).await,
        Err(e) => {
            let message = e.to_string();
            let provider = config
                .provider_name
                .clone()
                .unwrap_or_else(|| "auto".to_string());
            inputs
                .iter()
                .map(|_| {
                    Err(AnalysisError::ProviderNotConfigured {
                        provider: provider.clone(),
                        hint: message.clone(),
                    })
                })
                .collect()
        }
    }
}

/// [`analyze_many`] with caller-supplied collaborators.
pub async fn analyze_many_with(
    analyzer: &Analyzer,
    inputs: &[String],
    labels: &DisclosureLabels,
) -> Vec<Result<AnalysisOutput, AnalysisError>> {
    let mut results: Vec<(usize, Result<AnalysisOutput, AnalysisError>)> =
        stream::iter(inputs.iter().enumerate().map(|(idx, input_str)| async move {
            (idx, analyzer.analyze_path(input_str, labels).await)
        }))
        .buffer_unordered(analyzer.config().concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, r)| r).collect()
}

/// Extract text statistics without calling a model.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<DocumentInfo, AnalysisError> {
    let resolved = input::resolve_input(
        input_str.as_ref(),
        config.download_timeout_secs,
        config.max_file_size,
    )
    .await?;
    let doc = PdfiumExtractor::from_config(config)
        .extract(resolved.path(), config.password.as_deref())
        .await?;
    Ok(document_info(&resolved, &doc, config.min_text_chars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/report.md");
        write_atomic(&target, "# Report\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Report\n");
        assert!(!dir.path().join("nested/report.md.tmp").exists());
    }

    #[test]
    fn temp_pdf_holds_bytes() {
        let tmp = write_temp_pdf(b"%PDF-1.4").unwrap();
        assert_eq!(std::fs::read(tmp.path()).unwrap(), b"%PDF-1.4");
        assert_eq!(tmp.path().extension().and_then(|e| e.to_str()), Some("pdf"));
    }
}
