use super::*;
use crate::embeddings::{ChunkingConfig, Document, HashingEmbedder};
use crate::llm::PlaceholderCompletion;
use crate::retrieval::NO_INDEX_MESSAGE;
use anyhow::anyhow;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Default)]
struct CountingBackend {
    calls: AtomicUsize,
    fail: bool,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl CountingBackend {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .expect("lock not poisoned")
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

impl TextCompletionProvider for CountingBackend {
    fn model(&self) -> &str {
        "counting"
    }

    fn complete(&self, prompt: &str, mode: CompletionMode) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("lock not poisoned")
            .push(prompt.to_string());
        if self.fail {
            return Err(anyhow!("backend offline"));
        }
        PlaceholderCompletion::new("counting").complete(prompt, mode)
    }
}

#[derive(Default)]
struct CountingSearch {
    calls: AtomicUsize,
}

impl WebSearch for CountingSearch {
    fn search(&self, query: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("result for {}", query))
    }
}

struct Fixture {
    _temp_dir: TempDir,
    backend: Arc<CountingBackend>,
    search: Arc<CountingSearch>,
    orchestrator: Orchestrator,
}

fn fixture(backend: CountingBackend) -> Fixture {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let retrieval = Arc::new(RetrievalService::new(
        Arc::new(HashingEmbedder::new(128)),
        ChunkingConfig::default(),
        temp_dir.path().join("index"),
    ));
    let backend = Arc::new(backend);
    let search = Arc::new(CountingSearch::default());
    let orchestrator = Orchestrator::new(retrieval, backend.clone(), search.clone());

    Fixture {
        _temp_dir: temp_dir,
        backend,
        search,
        orchestrator,
    }
}

#[tokio::test]
async fn blank_request_touches_nothing() {
    let fixture = fixture(CountingBackend::default());

    for request in [
        AssistantRequest::default(),
        AssistantRequest {
            user_query: Some("   ".to_string()),
            error_logs: Some("\n".to_string()),
        },
    ] {
        let result = fixture.orchestrator.handle(request).await;
        assert!(matches!(result, Err(CodexrError::Input(_))));
    }
    assert_eq!(fixture.backend.calls(), 0);
    assert_eq!(fixture.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn known_error_skips_backend_and_search() {
    let fixture = fixture(CountingBackend::default());

    let response = fixture
        .orchestrator
        .handle(AssistantRequest {
            user_query: Some("ignored".to_string()),
            error_logs: Some("NullReferenceException: Object reference not set".to_string()),
        })
        .await
        .expect("handle should succeed");

    assert_eq!(fixture.backend.calls(), 0);
    assert_eq!(fixture.search.calls.load(Ordering::SeqCst), 0);
    assert_eq!(response.debug["source"], "known_pattern");
    assert!(response.subtasks.is_empty());
    assert!(response.retrieved_docs.is_empty());
    assert_eq!(response.search_results, json!({}));
}

#[tokio::test]
async fn unknown_error_calls_backend_once() {
    let fixture = fixture(CountingBackend::default());

    let response = fixture
        .orchestrator
        .handle(AssistantRequest::error_log("Shader compile failed at line 3"))
        .await
        .expect("handle should succeed");

    assert_eq!(fixture.backend.calls(), 1);
    assert!(fixture.backend.last_prompt().contains("Shader compile failed"));
    assert_eq!(response.debug["source"], "backend");
    assert!(!response.debug["explanation"].as_str().unwrap_or_default().is_empty());
    assert!(!response.debug["fix_suggestion"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn failed_debug_backend_degrades() {
    let fixture = fixture(CountingBackend::failing());

    let response = fixture
        .orchestrator
        .handle(AssistantRequest::error_log("Shader compile failed"))
        .await
        .expect("handle should succeed");

    assert_eq!(response.status, "success");
    assert_eq!(response.debug["source"], "degraded");
    assert!(
        response.debug["explanation"]
            .as_str()
            .unwrap_or_default()
            .contains("backend offline")
    );
}

#[tokio::test]
async fn query_without_index_reports_sentinel() {
    let fixture = fixture(CountingBackend::default());

    let response = fixture
        .orchestrator
        .handle(AssistantRequest::query("How do I add teleport locomotion in Unity VR?"))
        .await
        .expect("handle should succeed");

    assert_eq!(response.retrieved_docs, vec![NO_INDEX_MESSAGE.to_string()]);
    assert_eq!(fixture.backend.calls(), 1);
    assert!(!fixture.backend.last_prompt().contains(NO_INDEX_MESSAGE));
    assert_eq!(fixture.search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        response.search_results["search_result"],
        "result for How do I add teleport locomotion in Unity VR?"
    );
    assert!(response.code.contains("TeleportSetup"));
    assert_eq!(response.difficulty, "Medium");
}

#[tokio::test]
async fn query_passes_passages_to_backend() {
    let fixture = fixture(CountingBackend::default());
    fixture
        .orchestrator
        .retrieval()
        .build_index(&[
            Document::new("unity", "Snap turn rotates the XR Origin by a fixed angle."),
            Document::new("unreal", "Unreal replicates actors to clients."),
        ])
        .await
        .expect("build should succeed");

    let response = fixture
        .orchestrator
        .handle(AssistantRequest::query("snap turn angle"))
        .await
        .expect("handle should succeed");

    assert_eq!(response.retrieved_docs.len(), 2);
    assert!(response.retrieved_docs[0].contains("Snap turn"));
    let prompt = fixture.backend.last_prompt();
    assert!(prompt.starts_with("snap turn angle\n\nContext:"));
    assert!(prompt.contains("[1] Snap turn rotates"));
}

#[tokio::test]
async fn retrieval_error_is_shown_but_not_prompted() {
    let fixture = fixture(CountingBackend::default());
    // An index from a different provider cannot be loaded by the orchestrator's service
    RetrievalService::new(
        Arc::new(HashingEmbedder::new(64)),
        ChunkingConfig::default(),
        fixture._temp_dir.path().join("index"),
    )
    .build_index(&[Document::new("unity", "Teleport anchors mark landing spots.")])
    .await
    .expect("build should succeed");

    let response = fixture
        .orchestrator
        .handle(AssistantRequest::query("teleport anchors"))
        .await
        .expect("handle should succeed");

    assert_eq!(response.retrieved_docs.len(), 1);
    assert!(response.retrieved_docs[0].starts_with("Error: "));
    assert_eq!(fixture.backend.calls(), 1);
    assert_eq!(fixture.backend.last_prompt(), "teleport anchors");
}

#[tokio::test]
async fn failed_completion_keeps_other_sources() {
    let fixture = fixture(CountingBackend::failing());

    let response = fixture
        .orchestrator
        .handle(AssistantRequest::query("hand tracking"))
        .await
        .expect("handle should succeed");

    assert_eq!(response.raw, json!({ "error": "backend offline" }));
    assert!(response.subtasks.is_empty());
    assert_eq!(response.difficulty, "Unknown");
    assert_eq!(response.search_results["search_result"], "result for hand tracking");
    assert_eq!(response.retrieved_docs, vec![NO_INDEX_MESSAGE.to_string()]);
}

#[tokio::test]
async fn top_k_limits_passages() {
    let fixture = fixture(CountingBackend::default());
    let orchestrator = fixture.orchestrator.with_top_k(1);
    orchestrator
        .retrieval()
        .build_index(&[
            Document::new("a", "Teleport anchors"),
            Document::new("b", "Teleport areas"),
            Document::new("c", "Teleport providers"),
        ])
        .await
        .expect("build should succeed");

    let response = orchestrator
        .handle(AssistantRequest::query("teleport"))
        .await
        .expect("handle should succeed");
    assert_eq!(response.retrieved_docs.len(), 1);
}

#[test]
fn prompt_without_passages_is_the_query() {
    assert_eq!(build_prompt("teleport", &[]), "teleport");
    assert_eq!(
        build_prompt("teleport", &["one".to_string(), "two".to_string()]),
        "teleport\n\nContext:\n[1] one\n[2] two"
    );
}

#[test]
fn request_deserializes_with_missing_fields() {
    let request: AssistantRequest =
        serde_json::from_str(r#"{"user_query": "snap turn"}"#).expect("valid json");
    assert_eq!(request, AssistantRequest::query("snap turn"));

    let request: AssistantRequest = serde_json::from_str("{}").expect("valid json");
    assert_eq!(request, AssistantRequest::default());
}
