#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use codexr::embeddings::{ChunkingConfig, Document, HashingEmbedder, chunk_document};
use codexr::formatter::format_response;
use codexr::index::VectorIndex;
use codexr::llm::{CompletionMode, PlaceholderCompletion, TextCompletionProvider, parse_structured};
use codexr::orchestrator::{AssistantRequest, Orchestrator, build_prompt};
use codexr::retrieval::RetrievalService;
use codexr::search::{DisabledSearch, perform_search};
use std::sync::Arc;
use tempfile::TempDir;

const TELEPORT_QUERY: &str = "How do I add teleport locomotion in Unity VR?";

fn teleport_document() -> Document {
    Document::new(
        "https://docs.unity3d.com/Manual/xr-interaction-overview.html",
        "Add a TeleportationProvider to the XR Origin, then mark floors as teleportation areas.",
    )
}

fn mixed_chunks() -> Vec<codexr::embeddings::Chunk> {
    let config = ChunkingConfig {
        chunk_size: 80,
        chunk_overlap: 10,
    };
    let documents = [
        teleport_document(),
        Document::new(
            "https://docs.unrealengine.com/multiplayer",
            "Unreal replicates actors from the server to every connected client. \
             Replicated properties are marked in the header and updated each net tick.",
        ),
        Document::new(
            "https://docs.unity3d.com/Manual/SL-Reference.html",
            "ShaderLab files declare properties, subshaders and passes for the renderer.",
        ),
    ];
    documents
        .iter()
        .flat_map(|document| chunk_document(document, &config).expect("valid chunking config"))
        .collect()
}

#[tokio::test]
async fn teleport_query_returns_the_single_indexed_document() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let retrieval = Arc::new(RetrievalService::new(
        Arc::new(HashingEmbedder::new(256)),
        ChunkingConfig::default(),
        temp_dir.path().join("index"),
    ));
    retrieval
        .build_index(&[teleport_document()])
        .await
        .expect("build should succeed");

    let orchestrator = Orchestrator::new(
        retrieval,
        Arc::new(PlaceholderCompletion::new("GPT-4o-mini")),
        Arc::new(DisabledSearch),
    );
    let response = orchestrator
        .handle(AssistantRequest::query(TELEPORT_QUERY))
        .await
        .expect("handle should succeed");

    assert_eq!(response.retrieved_docs.len(), 1);
    assert!(response.retrieved_docs[0].contains("TeleportationProvider"));
    assert_eq!(response.status, "success");
    assert!(response.code.contains("TeleportSetup"));
}

#[tokio::test]
async fn persisted_index_answers_like_the_built_one() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let provider = Arc::new(HashingEmbedder::new(128));
    let chunks = mixed_chunks();

    let built = VectorIndex::build(&chunks, provider.clone()).expect("build should succeed");
    built
        .persist(temp_dir.path())
        .await
        .expect("persist should succeed");
    let loaded = VectorIndex::load(temp_dir.path(), provider)
        .await
        .expect("load should succeed");

    for query in [TELEPORT_QUERY, "replicated properties", "shader passes", "zzz"] {
        for k in [1, 3, chunks.len() + 2] {
            let expected: Vec<String> = built
                .query(query, k)
                .expect("query should succeed")
                .into_iter()
                .map(|hit| hit.text)
                .collect();
            let actual: Vec<String> = loaded
                .query(query, k)
                .expect("query should succeed")
                .into_iter()
                .map(|hit| hit.text)
                .collect();
            assert_eq!(expected, actual, "query {:?} with k={}", query, k);
        }
    }
}

#[test]
fn query_results_are_bounded_by_k() {
    let chunks = mixed_chunks();
    let index =
        VectorIndex::build(&chunks, Arc::new(HashingEmbedder::new(64))).expect("build should succeed");

    for k in 0..=chunks.len() + 3 {
        let hits = index.query("teleport", k).expect("query should succeed");
        assert_eq!(hits.len(), k.min(chunks.len()));
    }

    let empty = VectorIndex::build(&[], Arc::new(HashingEmbedder::new(64)))
        .expect("empty build should succeed");
    assert!(empty.query("teleport", 3).expect("query should succeed").is_empty());
}

#[test]
fn pipeline_pieces_compose_without_an_index() {
    let backend = PlaceholderCompletion::new("StarCoder2");
    let passages = vec!["foreach (var hand in hands) { }".to_string()];
    let reply = backend
        .complete(&build_prompt("hand tracking", &passages), CompletionMode::Normal)
        .expect("placeholder never fails");
    let structured = parse_structured(&reply);
    let search = perform_search(&DisabledSearch, "hand tracking");

    let formatted = format_response(&structured, Some(&search), None, Some(&passages));
    assert_eq!(formatted.code, "foreach (var hand in hands) { }");
    assert!(formatted.raw["response"].as_str().unwrap_or_default().starts_with("[StarCoder2]"));
    assert!(
        formatted.search_results["search_result"]
            .as_str()
            .unwrap_or_default()
            .starts_with("Error:")
    );
}
