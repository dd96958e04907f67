//! Configuration for disclosure analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. One struct holds every knob so a config can
//! be shared across concurrent analyses and logged as a whole.
//!
//! # Design choice: builder over constructor
//! Most callers change two or three fields. The builder lets them set only
//! those and rely on the documented defaults for the rest.

use crate::error::AnalysisError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Configuration for analysing a disclosure document.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use disclosure_lens::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gpt-4.1-mini")
///     .max_input_tokens(120_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// The analysis summarises figures from the filing; a low temperature
    /// keeps the model close to the source text.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient API failure. Default: 3.
    ///
    /// Authentication and context-size errors are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call LLM timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Token budget for the document text sent to the model. Default: 200 000.
    ///
    /// Longer texts are cut at a sentence boundary and marked as truncated.
    pub max_input_tokens: usize,

    /// Minimum trimmed character count of extracted text. Default: 100.
    pub min_text_chars: usize,

    /// Maximum accepted PDF size in bytes. Default: 10 MiB.
    pub max_file_size: u64,

    /// Number of documents analysed at once by `analyze_many`. Default: 4.
    pub concurrency: usize,

    /// libpdfium file or directory, tried before `PDFIUM_LIB_PATH`.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Receives stage events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            password: None,
            system_prompt: None,
            max_input_tokens: 200_000,
            min_text_chars: 100,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            concurrency: 4,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("max_input_tokens", &self.max_input_tokens)
            .field("min_text_chars", &self.min_text_chars)
            .field("max_file_size", &self.max_file_size)
            .field("concurrency", &self.concurrency)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_input_tokens(mut self, n: usize) -> Self {
        self.config.max_input_tokens = n;
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(AnalysisError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_input_tokens < 1000 {
            return Err(AnalysisError::InvalidConfig(format!(
                "max_input_tokens must be ≥ 1000, got {}",
                c.max_input_tokens
            )));
        }
        if c.max_file_size == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_file_size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let c = AnalysisConfig::builder().build().unwrap();
        assert_eq!(c.max_input_tokens, 200_000);
        assert_eq!(c.min_text_chars, 100);
        assert_eq!(c.max_file_size, 10 * 1024 * 1024);
        assert_eq!(c.concurrency, 4);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = AnalysisConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn tiny_token_budget_rejected() {
        let err = AnalysisConfig::builder()
            .max_input_tokens(10)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_input_tokens"));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalysisConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn pdfium_lib_path_is_carried() {
        assert!(AnalysisConfig::default().pdfium_lib_path.is_none());
        let c = AnalysisConfig::builder()
            .pdfium_lib_path("/opt/pdfium/lib")
            .build()
            .unwrap();
        assert_eq!(c.pdfium_lib_path, Some(PathBuf::from("/opt/pdfium/lib")));
        assert!(format!("{c:?}").contains("/opt/pdfium/lib"));
    }

    #[test]
    fn debug_redacts_password() {
        let c = AnalysisConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
