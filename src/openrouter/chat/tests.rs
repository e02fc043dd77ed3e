use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(host: &str) -> OpenRouterConfig {
    OpenRouterConfig {
        api_host: host.to_string(),
        api_key: Some("test-key".to_string()),
        chat_model: "test/chat-model".to_string(),
        timeout_seconds: 5,
        ..OpenRouterConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_contexts_return_sentinel_without_model_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ChatClient::new(&test_config(&server.uri())).expect("should build client");

    let answer = client
        .generate_answer("What is the capital?", &[], &[])
        .expect("sentinel path should succeed");
    assert_eq!(answer, NO_RELEVANT_INFORMATION);
}

#[tokio::test(flavor = "multi_thread")]
async fn answer_comes_from_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "test/chat-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                { "message": { "content": "Paris." } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&test_config(&server.uri())).expect("should build client");

    let answer = client
        .generate_answer(
            "What is the capital of France?",
            &["France's capital is Paris.".to_string()],
            &["geo.txt".to_string()],
        )
        .expect("answer should succeed");
    assert_eq!(answer, "Paris.");
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_failure_propagates_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&test_config(&server.uri())).expect("should build client");

    let err = client
        .generate_answer(
            "Question?",
            &["Some context.".to_string()],
            &[],
        )
        .expect_err("server error should propagate");
    assert!(matches!(err, crate::RagError::Llm(_)));
}

#[test]
fn prompt_labels_chunks_and_sources() {
    let prompt = build_prompt(
        "What color is the sky?",
        &["The sky is blue.".to_string(), "At night it is dark.".to_string()],
        &["sky.txt".to_string()],
    );

    assert!(prompt.contains("[Chunk 1]\nThe sky is blue."));
    assert!(prompt.contains("[Chunk 2]\nAt night it is dark."));
    assert!(prompt.contains("Sources: sky.txt"));
    assert!(prompt.contains("Question: What color is the sky?"));
    assert!(prompt.contains("using only the information below"));
}

#[test]
fn prompt_omits_sources_line_when_unknown() {
    let prompt = build_prompt("Q?", &["ctx".to_string()], &[]);
    assert!(!prompt.contains("Sources:"));
}
