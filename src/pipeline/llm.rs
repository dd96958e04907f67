//! Model interaction: budget the document text and call the provider.
//!
//! All prompt wording lives in [`crate::prompts`]; this module owns the
//! token budget, the retry loop and the mapping of provider failures onto
//! [`AnalysisError`].
//!
//! ## Retry Strategy
//!
//! Rate limits, timeouts and 5xx responses are transient. Exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`) spaces the retries: with a
//! 500 ms base and 3 retries the waits are 500 ms → 1 s → 2 s. Errors that
//! a retry cannot fix (bad key, oversized context) fail immediately.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::output::DisclosureLabels;
use crate::progress::ProgressCallback;
use crate::prompts::{analysis_input, DEFAULT_SYSTEM_PROMPT, TRUNCATION_NOTICE};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

// ── Token budget ─────────────────────────────────────────────────────────

/// Rough token count: Latin letters at 4 per token, Hangul syllables at 2,
/// everything else at 3. Rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    let mut latin = 0usize;
    let mut hangul = 0usize;
    let mut other = 0usize;
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            latin += 1;
        } else if ('가'..='힣').contains(&c) {
            hangul += 1;
        } else {
            other += 1;
        }
    }
    (latin as f64 / 4.0 + hangul as f64 / 2.0 + other as f64 / 3.0).ceil() as usize
}

/// Fit `text` into `max_tokens`.
///
/// Text within budget is returned unchanged. Otherwise it is cut to
/// `2 × max_tokens` characters, backed off to the last `.` when that lies
/// past 70 % of the cut, and followed by [`TRUNCATION_NOTICE`].
/// The flag reports whether anything was cut.
pub fn truncate_for_budget(text: &str, max_tokens: usize) -> (String, bool) {
    let estimated = estimate_tokens(text);
    if estimated <= max_tokens {
        return (text.to_string(), false);
    }

    let max_chars = max_tokens.saturating_mul(2);
    let cut_at = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let mut kept = &text[..cut_at];

    if let Some(dot) = kept.rfind('.') {
        if kept[..dot].chars().count() * 10 > max_chars * 7 {
            kept = &kept[..=dot];
        }
    }

    warn!(
        "Document text truncated: ~{} → ~{} tokens",
        estimated,
        estimate_tokens(kept)
    );
    (format!("{kept}\n\n{TRUNCATION_NOTICE}"), true)
}

// ── Request / response ───────────────────────────────────────────────────

/// Everything the generator needs for one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_message: String,
    /// Estimate for the untruncated document text.
    pub estimated_input_tokens: usize,
    pub truncated: bool,
}

impl GenerationRequest {
    /// Budget `document_text` and wrap it with the labels.
    pub fn for_document(
        document_text: &str,
        labels: &DisclosureLabels,
        config: &AnalysisConfig,
    ) -> Self {
        let estimated_input_tokens = estimate_tokens(document_text);
        debug!("Estimated input: {} tokens", estimated_input_tokens);
        let (text, truncated) = truncate_for_budget(document_text, config.max_input_tokens);
        Self {
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            user_message: analysis_input(&text, labels),
            estimated_input_tokens,
            truncated,
        }
    }
}

/// Model answer plus usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
}

/// Produces the markdown analysis for a prepared request.
#[async_trait]
pub trait AnalysisGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, AnalysisError>;
}

// ── Retry loop ───────────────────────────────────────────────────────────

/// Retry budget for one call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1)))
    }
}

/// Run `op` until it succeeds, fails permanently or the budget runs out.
///
/// Returns the value and the number of retries used.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    callback: Option<&ProgressCallback>,
    mut op: F,
) -> Result<(T, u32), AnalysisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalysisError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let backoff = policy.delay(attempt);
                warn!(
                    "LLM call failed ({}); retry {}/{} after {}ms",
                    e,
                    attempt,
                    policy.max_retries,
                    backoff.as_millis()
                );
                if let Some(cb) = callback {
                    cb.on_retry(attempt, &e.to_string());
                }
                sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

// ── Provider-backed generator ────────────────────────────────────────────

/// [`AnalysisGenerator`] that calls an edgequake-llm provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    provider_label: String,
    options: CompletionOptions,
    policy: RetryPolicy,
    api_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl LlmGenerator {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            provider_label: config
                .provider_name
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
            options: build_options(config),
            policy: RetryPolicy::from_config(config),
            api_timeout: Duration::from_secs(config.api_timeout_secs),
            progress: config.progress_callback.clone(),
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub async fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let provider = resolve_provider(config).await?;
        Ok(Self::new(provider, config))
    }

    async fn call_once(&self, messages: &[ChatMessage]) -> Result<Generation, AnalysisError> {
        let start = Instant::now();
        let response = timeout(self.api_timeout, self.provider.chat(messages, Some(&self.options)))
            .await
            .map_err(|_| AnalysisError::ApiTimeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })?
            .map_err(|e| classify_provider_error(&self.provider_label, &e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        debug!(
            "LLM answered: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(Generation {
            markdown: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
            retries: 0,
        })
    }
}

#[async_trait]
impl AnalysisGenerator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, AnalysisError> {
        let messages = vec![
            ChatMessage::system(&request.system_prompt),
            ChatMessage::user(&request.user_message),
        ];
        let (mut generation, retries) =
            with_retries(self.policy, self.progress.as_ref(), || self.call_once(&messages)).await?;
        generation.retries = retries;
        Ok(generation)
    }
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Map a provider error message onto the matching [`AnalysisError`].
///
/// "too large" is checked before rate limits: providers report requests
/// over the per-minute token quota as rate-limit errors whose message says
/// the request is too large, and those do not succeed on retry.
pub fn classify_provider_error(provider: &str, message: &str) -> AnalysisError {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["too large", "context length", "context_length", "maximum context"]) {
        AnalysisError::DocumentTooLarge {
            detail: message.to_string(),
        }
    } else if has(&["api key", "api_key", "authentication", "unauthorized", "401", "403"]) {
        AnalysisError::AuthError {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    } else if has(&["rate limit", "rate_limit", "429"]) {
        AnalysisError::RateLimitExceeded {
            provider: provider.to_string(),
            retry_after_secs: None,
        }
    } else {
        AnalysisError::LlmApiError {
            message: message.to_string(),
        }
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when
///    both are set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub async fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            info!("Using OpenAI provider with model {}", model);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
