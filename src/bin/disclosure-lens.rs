//! CLI binary for disclosure-lens.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use disclosure_lens::markdown;
use disclosure_lens::{
    analyze_many, inspect, AnalysisConfig, AnalysisOutput, AnalysisProgressCallback,
    DisclosureLabels, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that names the current pipeline stage.
///
/// With several inputs the stage events of different documents interleave;
/// the spinner shows the latest one and counts finished documents.
struct CliProgressCallback {
    bar: ProgressBar,
    total: usize,
    done: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_prefix(format!("0/{total}"));
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total,
            done: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let failed = self.failed.load(Ordering::SeqCst);
        let ok = self.total.saturating_sub(failed);
        if failed == 0 {
            eprintln!("{} {} analysed", green("✔"), bold(&plural(ok, "document")));
        } else {
            eprintln!(
                "{} {}/{} analysed  ({} failed)",
                if failed == self.total { red("✘") } else { yellow("⚠") },
                bold(&ok.to_string()),
                self.total,
                red(&failed.to_string()),
            );
        }
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(match stage {
            Stage::Reading => "Reading PDF…",
            Stage::Extracting => "Extracting text…",
            Stage::Analyzing => "Waiting for the model…",
            Stage::Rendering => "Rendering…",
        });
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<11} {}",
            green("✓"),
            stage,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_retry(&self, attempt: u32, error: &str) {
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} retry {}  {}",
            yellow("↻"),
            attempt,
            dim(&msg)
        ));
    }

    fn on_analysis_complete(&self, success: bool) {
        if !success {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        self.bar.set_prefix(format!("{done}/{}", self.total));
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a filing, markdown to stdout
  disclosure-lens filing.pdf -d "Major event report" -s "Capital increase"

  # Rendered HTML fragment to a file
  disclosure-lens filing.pdf -d "Major event report" -s "Merger" -o report.html

  # Several filings, one output file each in ./reports
  disclosure-lens a.pdf b.pdf c.pdf -d "Periodic report" -s "Annual" -o reports/ --format html

  # Analyse from URL with a specific model
  disclosure-lens https://example.com/filing.pdf -d "Fair disclosure" -s "Guidance" \
      --provider anthropic --model claude-sonnet-4-20250514

  # Render an existing markdown analysis (no API key needed)
  disclosure-lens --render analysis.md --format html

  # Text statistics only (no API key needed)
  disclosure-lens --inspect-only filing.pdf

  # Full result with stats as JSON
  disclosure-lens filing.pdf -d "Major event report" -s "Merger" --format json > out.json

OUTPUT FORMATS:
  md     Post-processed markdown returned by the model (default)
  html   <div class="md-document"> fragment with md-* classes
  text   Markdown markers stripped
  json   AnalysisOutput (labels, markdown, html, page count, stats)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  DLENS_PDFIUM_LIB        Same as --pdfium-lib, tried before PDFIUM_LIB_PATH
  RUST_LOG                Log filter, overrides --verbose/--quiet

SETUP:
  1. Install libpdfium (https://github.com/bblanchon/pdfium-binaries) and
     point --pdfium-lib or PDFIUM_LIB_PATH at it, or place it next to
     the binary.
  2. Set an API key:  export OPENAI_API_KEY=sk-...
  3. Analyse:         disclosure-lens filing.pdf -d TYPE -s SUBTYPE
"#;

/// Analyse PDF disclosure filings with an LLM and render the report.
#[derive(Parser, Debug)]
#[command(
    name = "disclosure-lens",
    version,
    about = "Analyse PDF disclosure filings with an LLM and render the report",
    long_about = "Extract the text of PDF disclosure filings (local files or URLs), ask a \
language model for a structured analysis given the disclosure type and specific type, and \
print the report as markdown, an HTML fragment, plain text or JSON. Supports OpenAI, \
Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "render")]
    inputs: Vec<String>,

    /// Disclosure category forwarded to the model.
    #[arg(short = 'd', long, env = "DLENS_DISCLOSURE_TYPE")]
    disclosure_type: Option<String>,

    /// Specific disclosure type forwarded to the model.
    #[arg(short = 's', long, env = "DLENS_SPECIFIC_TYPE")]
    specific_type: Option<String>,

    /// Output format.
    #[arg(short, long, env = "DLENS_FORMAT", value_enum, default_value = "md")]
    format: OutputFormat,

    /// Write to this file (or directory, with several inputs) instead of stdout.
    #[arg(short, long, env = "DLENS_OUTPUT")]
    output: Option<PathBuf>,

    /// Render an existing markdown file instead of analysing PDFs.
    #[arg(long, conflicts_with_all = ["inputs", "inspect_only"])]
    render: Option<PathBuf>,

    /// Print text statistics only, no model call.
    #[arg(long)]
    inspect_only: bool,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DLENS_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DLENS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// libpdfium file or directory; tried before PDFIUM_LIB_PATH.
    #[arg(long, env = "DLENS_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Estimated input-token budget; longer documents are truncated.
    #[arg(long, env = "DLENS_MAX_INPUT_TOKENS", default_value_t = 200_000)]
    max_input_tokens: usize,

    /// Max LLM output tokens.
    #[arg(long, env = "DLENS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DLENS_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries on transient LLM failure.
    #[arg(long, env = "DLENS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Largest accepted PDF, in bytes.
    #[arg(long, env = "DLENS_MAX_FILE_SIZE", default_value_t = disclosure_lens::config::DEFAULT_MAX_FILE_SIZE)]
    max_file_size: u64,

    /// Minimum characters of extracted text.
    #[arg(long, env = "DLENS_MIN_TEXT_CHARS", default_value_t = 100)]
    min_text_chars: usize,

    /// Documents analysed concurrently.
    #[arg(short, long, env = "DLENS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Disable the progress spinner.
    #[arg(long, env = "DLENS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DLENS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DLENS_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DLENS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "DLENS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Md,
    Html,
    Text,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Html => "html",
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level feedback, so library logs drop to
    // ERROR while it is shown.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.inspect_only && cli.render.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Render-only mode ─────────────────────────────────────────────────
    if let Some(ref path) = cli.render {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read markdown from {:?}", path))?;
        let body = render_markdown(&source, cli.format)?;
        return emit(&body, cli.output.as_deref()).await;
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        for input in &cli.inputs {
            let info = inspect(input, &config)
                .await
                .with_context(|| format!("Failed to inspect {input}"))?;

            if cli.format == OutputFormat::Json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&info).context("Failed to serialize info")?
                );
            } else {
                println!("File:         {}", info.filename);
                println!("Pages:        {}", info.page_count);
                println!("Size:         {} bytes", info.file_size);
                println!("Text chars:   {}", info.text_chars);
                println!("Est. tokens:  {}", info.estimated_tokens);
                println!("Analysable:   {}", info.analysable);
            }
        }
        return Ok(());
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let labels = DisclosureLabels::new(
        cli.disclosure_type.clone().unwrap_or_default(),
        cli.specific_type.clone().unwrap_or_default(),
    );
    labels.validate()?;

    let progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )
    .await?;

    let results = analyze_many(&cli.inputs, &labels, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }

    let multi = cli.inputs.len() > 1;
    let mut failures = 0usize;

    for (input, result) in cli.inputs.iter().zip(results) {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", red("✘"), bold(input), e);
                continue;
            }
        };

        let body = format_output(&output, cli.format)?;
        let target = match (&cli.output, multi) {
            (Some(dir), true) => Some(dir.join(output_name(&output.filename, cli.format))),
            (Some(path), false) => Some(path.clone()),
            (None, _) => None,
        };
        emit(&body, target.as_deref()).await?;

        if !cli.quiet {
            eprintln!(
                "{}  {}  {} pages  {}ms{}",
                green("✔"),
                bold(&output.filename),
                output.page_count,
                output.stats.total_ms,
                target
                    .as_ref()
                    .map(|p| format!("  →  {}", p.display()))
                    .unwrap_or_default(),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out{}",
                dim(&output.stats.input_tokens.to_string()),
                dim(&output.stats.output_tokens.to_string()),
                if output.stats.truncated {
                    yellow("  (input truncated)")
                } else {
                    String::new()
                },
            );
        }
    }

    if failures > 0 {
        anyhow::bail!(
            "{} of {} failed",
            plural(failures, "document"),
            cli.inputs.len()
        );
    }
    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .max_input_tokens(cli.max_input_tokens)
        .min_text_chars(cli.min_text_chars)
        .max_file_size(cli.max_file_size)
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn format_output(output: &AnalysisOutput, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Md => output.markdown.clone(),
        OutputFormat::Html => output.html.clone(),
        OutputFormat::Text => output.plain_text(),
        OutputFormat::Json => {
            serde_json::to_string_pretty(output).context("Failed to serialise output")?
        }
    })
}

/// `--render`: the markdown file goes through the renderer only.
fn render_markdown(source: &str, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Md => source.to_string(),
        OutputFormat::Html => markdown::to_html(source),
        OutputFormat::Text => markdown::extract_plain_text(source),
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "blocks": markdown::parse(source),
            "html": markdown::to_html(source),
        }))
        .context("Failed to serialise blocks")?,
    })
}

/// `filing.pdf` + html → `filing.html`.
fn output_name(filename: &str, format: OutputFormat) -> PathBuf {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "analysis".to_string());
    PathBuf::from(format!("{stem}.{}", format.extension()))
}

async fn emit(body: &str, target: Option<&Path>) -> Result<()> {
    match target {
        Some(path) => disclosure_lens::analyze::write_atomic(path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
            if !body.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
    }
}
