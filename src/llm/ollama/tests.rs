use super::*;
use crate::config::EmbeddingConfig;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let url = Url::parse(&server.uri()).expect("mock server uri");
    Config {
        embedding: EmbeddingConfig {
            host: url.host_str().unwrap_or("127.0.0.1").to_string(),
            port: url.port().unwrap_or(80),
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    }
}

fn client_for(server: &MockServer) -> OllamaClient {
    OllamaClient::new(&config_for(server))
        .expect("Failed to create client")
        .with_retry_attempts(1)
}

#[tokio::test(flavor = "multi_thread")]
async fn debug_mode_sends_debug_system_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "codellama",
            "system": DEBUG_SYSTEM_PROMPT
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "{\"explanation\": \"missing asset\", \"fix_suggestion\": \"reimport\"}"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaCompletion::with_client(client_for(&server), "codellama");
    let reply = backend
        .complete("Explain this error log", CompletionMode::Debug)
        .expect("completion should succeed");
    assert!(reply.contains("missing asset"));
    assert_eq!(backend.model(), "codellama");
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = OllamaCompletion::with_client(client_for(&server), "missing-model");
    assert!(
        backend
            .complete("How do I add snap turn?", CompletionMode::Normal)
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_on_generate_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let backend =
        OllamaCompletion::new(&config_for(&server), "codellama").expect("backend builds");
    assert!(
        backend
            .complete("How do I add teleport?", CompletionMode::Normal)
            .is_err()
    );
}
