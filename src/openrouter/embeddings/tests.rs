use super::*;
use crate::RagError;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn test_config(host: &str) -> OpenRouterConfig {
    OpenRouterConfig {
        api_host: host.to_string(),
        api_key: Some("test-key".to_string()),
        batch_size: 10,
        max_retries: 3,
        base_delay_ms: 1,
        timeout_seconds: 5,
        ..OpenRouterConfig::default()
    }
}

/// Responds with one deterministic vector per input, derived from the input
/// text, so order preservation is observable.
struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body should be JSON");
        let inputs = body["input"].as_array().expect("input should be an array");

        let data: Vec<serde_json::Value> = inputs
            .iter()
            .map(|input| {
                let text = input.as_str().expect("input items should be strings");
                let len = text.chars().count() as f32;
                json!({ "embedding": [len, len / 2.0, 1.0] })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn embeddings_preserve_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(EchoEmbeddings)
        .expect(1)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).expect("should build client");

    let texts = vec!["a".to_string(), "bbb".to_string(), "ccccc".to_string()];
    let embeddings = client.embed_texts(&texts).expect("embedding should succeed");

    assert_eq!(embeddings.len(), 3);
    assert_eq!(embeddings[0][0], 1.0);
    assert_eq!(embeddings[1][0], 3.0);
    assert_eq!(embeddings[2][0], 5.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn large_input_fans_out_into_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EchoEmbeddings)
        .expect(3)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).expect("should build client");

    // 25 texts with batch_size 10 means 3 requests
    let texts: Vec<String> = (0..25).map(|i| format!("text {}", i)).collect();
    let embeddings = client.embed_texts(&texts).expect("embedding should succeed");

    assert_eq!(embeddings.len(), 25);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_input_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EchoEmbeddings)
        .expect(0)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).expect("should build client");

    let embeddings = client.embed_texts(&[]).expect("empty input should succeed");
    assert!(embeddings.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_server_errors_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).expect("should build client");

    let err = client
        .embed_texts(&["hello".to_string()])
        .expect_err("should exhaust retries");

    match err {
        RagError::Embedding(message) => {
            assert!(message.contains("3 attempt"), "unexpected message: {message}");
        }
        other => panic!("expected Embedding error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_fail_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).expect("should build client");

    let err = client
        .embed_texts(&["hello".to_string()])
        .expect_err("client error should not be retried");
    assert!(matches!(err, RagError::Embedding(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn response_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [{ "embedding": [1.0, 2.0] }] })),
        )
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).expect("should build client");

    let err = client
        .embed_texts(&["one".to_string(), "two".to_string()])
        .expect_err("mismatched response should fail");
    assert!(matches!(err, RagError::Embedding(_)));
}
