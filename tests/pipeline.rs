//! Offline pipeline tests with fake collaborators.
//!
//! The extractor and generator are replaced by in-process fakes, so these
//! tests need neither pdfium nor an API key. Inputs are temp files that only
//! carry the `%PDF` magic the input validation looks for.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use disclosure_lens::{
    analyze_many_with, AnalysisConfig, AnalysisError, AnalysisGenerator, AnalysisProgressCallback,
    AnalysisRecord, AnalysisService, AnalysisStore, Analyzer, DisclosureLabels, ExtractedDocument,
    Generation, GenerationRequest, Identity, MemoryStore, NewAnalysis, Stage, TextExtractor,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ── Fakes ────────────────────────────────────────────────────────────────────

const FILING_TEXT: &str = "The board resolved to issue 1,000,000 new common shares \
by way of a rights offering to existing shareholders. Proceeds fund the new plant.";

const MODEL_ANSWER: &str = "```markdown\r\n## SUMMARY\r\n\r\n**Rights offering** of 1,000,000 shares.   \r\n\r\n\r\n\r\n\r\n## OUTLOOK AND RISKS\r\n\r\n- Dilution\r\n```";

/// Returns fixed text; a file named `slow_*` sleeps first.
struct FakeExtractor {
    text: String,
}

impl FakeExtractor {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self { text: text.into() })
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(
        &self,
        path: &Path,
        _password: Option<&str>,
    ) -> Result<ExtractedDocument, AnalysisError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("slow_") {
            tokio::time::sleep(Duration::from_millis(80)).await;
        }
        Ok(ExtractedDocument {
            text: self.text.clone(),
            page_count: 2,
        })
    }
}

/// Returns a fixed answer and remembers every request.
struct FakeGenerator {
    answer: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.into(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Ok(Generation {
            markdown: self.answer.clone(),
            input_tokens: 321,
            output_tokens: 54,
            retries: 0,
        })
    }
}

/// Store whose inserts always fail.
struct BrokenStore;

#[async_trait]
impl AnalysisStore for BrokenStore {
    async fn insert(&self, _new: NewAnalysis) -> Result<AnalysisRecord, AnalysisError> {
        Err(AnalysisError::StoreError("connection refused".into()))
    }
    async fn list_by_owner(&self, _owner: &str) -> Result<Vec<AnalysisRecord>, AnalysisError> {
        Ok(Vec::new())
    }
    async fn get(&self, _id: Uuid, _owner: &str) -> Result<Option<AnalysisRecord>, AnalysisError> {
        Ok(None)
    }
    async fn delete(&self, _id: Uuid, _owner: &str) -> Result<bool, AnalysisError> {
        Ok(false)
    }
    async fn delete_all(&self, _owner: &str) -> Result<usize, AnalysisError> {
        Ok(0)
    }
}

/// Records progress events as strings.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl AnalysisProgressCallback for Recorder {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start {stage}"));
    }
    fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(format!("done {stage}"));
    }
    fn on_analysis_complete(&self, success: bool) {
        self.events.lock().unwrap().push(format!("complete {success}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const PDF_BYTES: &[u8] = b"%PDF-1.7\n% fake body\n";

fn labels() -> DisclosureLabels {
    DisclosureLabels::new("Major event report", "Capital increase")
}

fn config() -> AnalysisConfig {
    AnalysisConfig::builder()
        .min_text_chars(20)
        .concurrency(3)
        .build()
        .unwrap()
}

fn analyzer(generator: Arc<FakeGenerator>) -> Analyzer {
    Analyzer::new(FakeExtractor::new(FILING_TEXT), generator, config())
}

fn write_pdf(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, PDF_BYTES).unwrap();
    path.to_string_lossy().into_owned()
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn analyze_bytes_cleans_and_renders() {
    let generator = FakeGenerator::new(MODEL_ANSWER);
    let output = analyzer(generator.clone())
        .analyze_bytes(PDF_BYTES, "filing.pdf", &labels())
        .await
        .unwrap();

    assert_eq!(output.filename, "filing.pdf");
    assert_eq!(output.page_count, 2);
    assert_eq!(output.file_size, PDF_BYTES.len() as u64);
    assert_eq!(output.labels, labels());

    assert!(output.markdown.starts_with("## SUMMARY\n"));
    assert!(output.markdown.ends_with("- Dilution\n"));
    assert!(!output.markdown.contains('\r'));
    assert!(!output.markdown.contains("```"));
    assert!(!output.markdown.contains("\n\n\n\n"));

    assert!(output.html.starts_with(r#"<div class="md-document">"#));
    assert!(output.html.contains("md-heading-2"));
    assert!(output.html.contains(r#"<strong class="md-bold">Rights offering</strong>"#));
    assert!(output.html.contains("md-unordered-list"));

    assert_eq!(output.stats.input_tokens, 321);
    assert_eq!(output.stats.output_tokens, 54);
    assert!(!output.stats.truncated);
    assert!(output.plain_text().starts_with("SUMMARY"));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn labels_and_text_reach_the_model() {
    let generator = FakeGenerator::new("## SUMMARY\n\nok");
    analyzer(generator.clone())
        .analyze_bytes(PDF_BYTES, "x.pdf", &labels())
        .await
        .unwrap();

    let requests = generator.requests.lock().unwrap();
    let message = &requests[0].user_message;
    assert!(message.contains(FILING_TEXT));
    assert!(message.contains("Major event report"));
    assert!(message.contains("Capital increase"));
    assert!(!requests[0].system_prompt.is_empty());
}

#[tokio::test]
async fn upload_name_is_decoded_or_defaulted() {
    let a = analyzer(FakeGenerator::new("ok"));

    let out = a
        .analyze_bytes(PDF_BYTES, "%EA%B3%B5%EC%8B%9C.pdf", &labels())
        .await
        .unwrap();
    assert_eq!(out.filename, "공시.pdf");

    let out = a.analyze_bytes(PDF_BYTES, "  ", &labels()).await.unwrap();
    assert!(out.filename.starts_with("analysis_"), "{}", out.filename);
    assert!(out.filename.ends_with(".pdf"));
}

#[tokio::test]
async fn missing_label_fails_before_model_call() {
    let generator = FakeGenerator::new("ok");
    let err = analyzer(generator.clone())
        .analyze_bytes(PDF_BYTES, "x.pdf", &DisclosureLabels::new("Major event report", " "))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::MissingClassification { flag: "specific-type", .. }
    ));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn too_little_text_is_rejected() {
    let generator = FakeGenerator::new("ok");
    let a = Analyzer::new(FakeExtractor::new("   short   "), generator.clone(), config());
    let err = a
        .analyze_bytes(PDF_BYTES, "scan.pdf", &labels())
        .await
        .unwrap_err();

    match err {
        AnalysisError::NoExtractableText { chars, min, .. } => {
            assert_eq!(chars, 5);
            assert_eq!(min, 20);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn non_pdf_upload_is_rejected() {
    let err = analyzer(FakeGenerator::new("ok"))
        .analyze_bytes(b"<html>not a pdf</html>", "x.pdf", &labels())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NotAPdf { .. }), "{err:?}");
}

#[tokio::test]
async fn missing_file_is_reported() {
    let err = analyzer(FakeGenerator::new("ok"))
        .analyze_path("/definitely/not/here.pdf", &labels())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::FileNotFound { .. }));
}

#[tokio::test]
async fn progress_events_follow_stage_order() {
    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::builder()
        .min_text_chars(20)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let a = Analyzer::new(FakeExtractor::new(FILING_TEXT), FakeGenerator::new("ok"), config);

    a.analyze_bytes(PDF_BYTES, "x.pdf", &labels()).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    let mut expected: Vec<String> = Stage::ALL
        .iter()
        .flat_map(|s| [format!("start {s}"), format!("done {s}")])
        .collect();
    expected.push("complete true".into());
    assert_eq!(events, expected);
}

#[tokio::test]
async fn failed_analysis_reports_completion() {
    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let a = Analyzer::new(FakeExtractor::new(FILING_TEXT), FakeGenerator::new("ok"), config);

    a.analyze_path("/nope.pdf", &labels()).await.unwrap_err();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events, vec!["start reading", "complete false"]);
}

#[tokio::test]
async fn analyze_many_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "slow_first.pdf"),
        write_pdf(dir.path(), "second.pdf"),
        dir.path().join("missing.pdf").to_string_lossy().into_owned(),
        write_pdf(dir.path(), "fourth.pdf"),
    ];

    let results = analyze_many_with(&analyzer(FakeGenerator::new("ok")), &inputs, &labels()).await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().filename, "slow_first.pdf");
    assert_eq!(results[1].as_ref().unwrap().filename, "second.pdf");
    assert!(matches!(results[2], Err(AnalysisError::FileNotFound { .. })));
    assert_eq!(results[3].as_ref().unwrap().filename, "fourth.pdf");
}

// ── Service ──────────────────────────────────────────────────────────────────

fn service() -> AnalysisService<MemoryStore> {
    AnalysisService::new(
        analyzer(FakeGenerator::new(MODEL_ANSWER)),
        Arc::new(MemoryStore::new()),
    )
}

#[tokio::test]
async fn anonymous_analysis_is_not_stored() {
    let svc = service();
    let saved = svc
        .analyze_and_save(None, PDF_BYTES, "x.pdf", &labels())
        .await
        .unwrap();

    assert!(saved.record_id.is_none());
    assert!(saved.output.html.contains("md-document"));
    assert!(svc.store().is_empty().await);
}

#[tokio::test]
async fn identified_analysis_is_stored() {
    let svc = service();
    let alice = Identity::new("alice").with_email("alice@example.com");

    let saved = svc
        .analyze_and_save(Some(&alice), PDF_BYTES, "filing.pdf", &labels())
        .await
        .unwrap();
    let id = saved.record_id.expect("record id");

    let record = svc.get(Some(&alice), id).await.unwrap();
    assert_eq!(record.owner_id, "alice");
    assert_eq!(record.filename, "filing.pdf");
    assert_eq!(record.disclosure_type, "Major event report");
    assert_eq!(record.specific_type, "Capital increase");
    assert_eq!(record.result_markdown, saved.output.markdown);
    assert_eq!(record.page_count, 2);
    assert_eq!(record.file_size, PDF_BYTES.len() as u64);
}

#[tokio::test]
async fn history_is_newest_first() {
    let svc = service();
    let alice = Identity::new("alice");
    for name in ["one.pdf", "two.pdf", "three.pdf"] {
        svc.analyze_and_save(Some(&alice), PDF_BYTES, name, &labels())
            .await
            .unwrap();
    }

    let names: Vec<String> = svc
        .history(Some(&alice))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.filename)
        .collect();
    assert_eq!(names, vec!["three.pdf", "two.pdf", "one.pdf"]);
}

#[tokio::test]
async fn store_operations_require_identity() {
    let svc = service();
    let id = Uuid::new_v4();
    assert!(matches!(svc.history(None).await, Err(AnalysisError::Unauthenticated)));
    assert!(matches!(svc.get(None, id).await, Err(AnalysisError::Unauthenticated)));
    assert!(matches!(svc.delete(None, id).await, Err(AnalysisError::Unauthenticated)));
    assert!(matches!(svc.delete_all(None).await, Err(AnalysisError::Unauthenticated)));
}

#[tokio::test]
async fn records_are_invisible_to_other_owners() {
    let svc = service();
    let alice = Identity::new("alice");
    let mallory = Identity::new("mallory");

    let id = svc
        .analyze_and_save(Some(&alice), PDF_BYTES, "x.pdf", &labels())
        .await
        .unwrap()
        .record_id
        .unwrap();

    assert!(matches!(
        svc.get(Some(&mallory), id).await,
        Err(AnalysisError::NotFound { .. })
    ));
    assert!(matches!(
        svc.delete(Some(&mallory), id).await,
        Err(AnalysisError::NotFound { .. })
    ));
    assert_eq!(svc.delete_all(Some(&mallory)).await.unwrap(), 0);
    assert!(svc.history(Some(&mallory)).await.unwrap().is_empty());

    svc.delete(Some(&alice), id).await.unwrap();
    assert!(matches!(
        svc.get(Some(&alice), id).await,
        Err(AnalysisError::NotFound { .. })
    ));
}

#[tokio::test]
async fn delete_all_counts_removed_records() {
    let svc = service();
    let alice = Identity::new("alice");
    let bob = Identity::new("bob");
    for who in [&alice, &alice, &bob] {
        svc.analyze_and_save(Some(who), PDF_BYTES, "x.pdf", &labels())
            .await
            .unwrap();
    }

    assert_eq!(svc.delete_all(Some(&alice)).await.unwrap(), 2);
    assert_eq!(svc.history(Some(&bob)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_save_still_returns_output() {
    let svc = AnalysisService::new(
        analyzer(FakeGenerator::new(MODEL_ANSWER)),
        Arc::new(BrokenStore),
    );
    let saved = svc
        .analyze_and_save(Some(&Identity::new("alice")), PDF_BYTES, "x.pdf", &labels())
        .await
        .unwrap();

    assert!(saved.record_id.is_none());
    assert!(saved.output.markdown.starts_with("## SUMMARY"));
}
