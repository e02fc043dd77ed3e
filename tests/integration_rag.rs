// End-to-end pipeline test: configuration from disk, ingestion, retrieval,
// answering, and deletion over a temporary database and a mocked API

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use docrag::chunking::ChunkingConfig;
use docrag::config::{Config, OpenRouterConfig};
use docrag::openrouter::NO_RELEVANT_INFORMATION;
use docrag::rag::RagService;

/// Embedding dimension used throughout this test; must match the mock API
const DIMENSION: usize = 64;

/// Embeddings responder deriving one deterministic vector per input text
struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body should be JSON");
        let inputs = body["input"].as_array().cloned().unwrap_or_default();

        let data: Vec<serde_json::Value> = inputs
            .iter()
            .map(|text| {
                let len = text.as_str().map_or(0, |t| t.chars().count()) as f32;
                let mut vector = vec![0.01f32; DIMENSION];
                vector[0] = len;
                vector[1] = len / 2.0;
                json!({ "embedding": vector })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

async fn start_mock_api() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EchoEmbeddings)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "content": "Grounded answer." } } ]
        })))
        .mount(&server)
        .await;

    server
}

fn write_config(api_host: &str, temp_dir: &TempDir) -> Config {
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        openrouter: OpenRouterConfig {
            api_host: api_host.to_string(),
            api_key: Some("test-key".to_string()),
            embedding_dimension: DIMENSION as u32,
            base_delay_ms: 1,
            timeout_seconds: 5,
            ..OpenRouterConfig::default()
        },
        chunking: ChunkingConfig {
            chunk_size: 120,
            chunk_overlap: 20,
        },
        ..Config::default()
    };
    config.save().expect("should save config");
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_round_trip_from_saved_config() {
    let server = start_mock_api().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_config(&server.uri(), &temp_dir);

    // The service runs from the configuration persisted on disk
    let config = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(config.openrouter.api_host, server.uri());
    assert_eq!(config.openrouter.embedding_dimension, DIMENSION as u32);

    let service = RagService::new(config).await.expect("should build service");

    let content = b"Rust favors explicit error handling through Result types.\n\n\
                    Ownership rules make data races impossible to compile.\n\n\
                    Traits describe shared behavior across otherwise unrelated types."
        .to_vec();
    let summary = service
        .process_and_store(content, "rust-notes.md")
        .await
        .expect("should ingest markdown");

    assert_eq!(summary.status, "success");
    assert!(!summary.streaming);
    assert!(summary.chunks_processed >= 2);

    let files = service
        .list_stored_files()
        .await
        .expect("should list files");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].source, "rust-notes.md");
    assert_eq!(files[0].document_count, summary.chunks_processed);

    let results = service
        .search_in_database("How does Rust handle errors?", Some(2), None)
        .await
        .expect("should search");
    assert!(results.contexts_used >= 1);
    assert!(results.contexts_used <= 2);
    assert_eq!(results.sources, vec!["rust-notes.md".to_string()]);

    let answer = service
        .ask_from_database("How does Rust handle errors?", None, Some("rust-notes.md"))
        .await
        .expect("should answer");
    assert_eq!(answer.answer, "Grounded answer.");
    assert_eq!(answer.sources, vec!["rust-notes.md".to_string()]);

    let deleted = service
        .forget_source("rust-notes.md")
        .await
        .expect("should forget source");
    assert_eq!(deleted, summary.chunks_processed);

    let files = service
        .list_stored_files()
        .await
        .expect("should list files");
    assert!(files.is_empty());

    // With the corpus gone, answering degrades to the sentinel
    let answer = service
        .ask_from_database("How does Rust handle errors?", None, None)
        .await
        .expect("should answer over empty corpus");
    assert_eq!(answer.answer, NO_RELEVANT_INFORMATION);
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_database_resets_the_corpus() {
    let server = start_mock_api().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(&server.uri(), &temp_dir);

    let service = RagService::new(config).await.expect("should build service");

    service
        .process_and_store(b"Alpha bravo charlie.".to_vec(), "a.txt")
        .await
        .expect("should ingest a.txt");
    service
        .process_and_store(b"Delta echo foxtrot.".to_vec(), "b.txt")
        .await
        .expect("should ingest b.txt");

    assert_eq!(
        service
            .list_stored_files()
            .await
            .expect("should list files")
            .len(),
        2
    );

    service.clear_database().await.expect("should clear");

    assert!(
        service
            .list_stored_files()
            .await
            .expect("should list files")
            .is_empty()
    );

    // The cleared collection accepts new ingestions
    let summary = service
        .process_and_store(b"Golf hotel india.".to_vec(), "c.txt")
        .await
        .expect("should ingest after clear");
    assert_eq!(summary.chunks_processed, 1);
}
