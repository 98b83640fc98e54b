use super::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FailingSearch;

impl WebSearch for FailingSearch {
    fn search(&self, _query: &str) -> Result<String> {
        Err(anyhow!("quota exceeded"))
    }
}

fn config_for(server: &MockServer) -> SearchConfig {
    SearchConfig {
        api_key: None,
        endpoint: format!("{}/search.json", server.uri()),
        ..SearchConfig::default()
    }
}

#[test]
fn failures_become_error_strings() {
    let result = perform_search(&FailingSearch, "snap turn");
    assert_eq!(result, json!({ "search_result": "Error: quota exceeded" }));
}

#[test]
fn disabled_search_never_panics() {
    let result = perform_search(&DisabledSearch, "snap turn");
    let text = result["search_result"]
        .as_str()
        .expect("search_result is a string");
    assert!(text.starts_with("Error: web search is not configured"));
}

#[test]
fn debug_output_redacts_key() {
    let client = SerpApiClient::new(&SearchConfig::default(), "sk-secret");
    let debug = format!("{client:?}");
    assert!(debug.contains("serpapi.com"));
    assert!(!debug.contains("sk-secret"));
}

#[test]
fn summary_prefers_direct_answers() {
    let response = json!({
        "answer_box": {"snippet": "Use the XR Interaction Toolkit."},
        "organic_results": [{"snippet": "other"}]
    });
    assert_eq!(
        summarize_results(&response).expect("summary"),
        "Use the XR Interaction Toolkit."
    );

    let response = json!({"knowledge_graph": {"description": "Unity is a game engine."}});
    assert_eq!(
        summarize_results(&response).expect("summary"),
        "Unity is a game engine."
    );

    let response = json!({
        "organic_results": [{"snippet": "first"}, {"title": "no snippet"}, {"snippet": "second"}]
    });
    assert_eq!(summarize_results(&response).expect("summary"), "first\nsecond");

    assert_eq!(summarize_results(&json!({})).expect("summary"), NO_RESULT);
    assert!(summarize_results(&json!({"error": "Invalid API key"})).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn serpapi_request_carries_query_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("q", "unity teleport"))
        .and(query_param("engine", "google"))
        .and(query_param("api_key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organic_results": [{"snippet": "Add a TeleportationArea to the floor."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SerpApiClient::new(&config_for(&server), "test-key");
    let result = perform_search(&client, "unity teleport");
    assert_eq!(
        result,
        json!({ "search_result": "Add a TeleportationArea to the floor." })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn serpapi_http_errors_are_wrapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = SerpApiClient::new(&config_for(&server), "bad-key");
    let result = perform_search(&client, "unity teleport");
    let text = result["search_result"]
        .as_str()
        .expect("search_result is a string");
    assert!(text.starts_with("Error:"), "{text}");
    assert!(text.contains("401"), "{text}");
}
