// CLI command implementations
// Thin wrappers that load configuration, drive the RAG service, and print
// results as pretty JSON

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::config::{Config, get_config_dir};
use crate::rag::RagService;

#[derive(Debug, Serialize)]
struct ForgetSummary<'a> {
    source: &'a str,
    deleted: usize,
}

/// Ingest a local file into the persistent collection
#[inline]
pub async fn ingest(path: &Path) -> Result<()> {
    let filename = file_name(path)?;
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    info!("Ingesting {}", filename);

    let service = build_service().await?;
    let bar = spinner(&format!("Ingesting {}", filename));
    let result = service.process_and_store(content, &filename).await;
    bar.finish_and_clear();

    print_json(&result.context("Ingestion failed")?)
}

/// Fetch a web page and ingest it under the "web" source tag
#[inline]
pub async fn ingest_url(url: &str) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;

    info!("Ingesting web page {}", url);

    let service = build_service().await?;
    let bar = spinner(&format!("Fetching {}", url));
    let result = service.ingest_url(&url).await;
    bar.finish_and_clear();

    print_json(&result.context("Web ingestion failed")?)
}

/// Answer a question from the persistent collection
#[inline]
pub async fn ask(question: &str, top_k: Option<usize>, file: Option<&str>) -> Result<()> {
    let service = build_service().await?;
    let bar = spinner("Thinking");
    let result = service.ask_from_database(question, top_k, file).await;
    bar.finish_and_clear();

    print_json(&result.context("Question answering failed")?)
}

/// Answer a question from one file via a temporary collection
#[inline]
pub async fn ask_file(path: &Path, question: &str, top_k: Option<usize>) -> Result<()> {
    let filename = file_name(path)?;
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let service = build_service().await?;
    let bar = spinner(&format!("Answering from {}", filename));
    let result = service
        .ask_with_temporary_file(question, content, &filename, top_k)
        .await;
    bar.finish_and_clear();

    print_json(&result.context("Temporary-file answering failed")?)
}

/// Raw similarity search over the persistent collection
#[inline]
pub async fn search(query: &str, top_k: Option<usize>, file: Option<&str>) -> Result<()> {
    let service = build_service().await?;
    let results = service
        .search_in_database(query, top_k, file)
        .await
        .context("Search failed")?;

    print_json(&results)
}

/// List stored sources with their chunk counts
#[inline]
pub async fn list() -> Result<()> {
    let service = build_service().await?;
    let files = service
        .list_stored_files()
        .await
        .context("Failed to list stored files")?;

    if files.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'docrag ingest <path>' to add one.");
        return Ok(());
    }

    print_json(&files)
}

/// Remove every record for one source
#[inline]
pub async fn forget(source: &str) -> Result<()> {
    let service = build_service().await?;
    let deleted = service
        .forget_source(source)
        .await
        .with_context(|| format!("Failed to delete records for {}", source))?;

    print_json(&ForgetSummary { source, deleted })
}

/// Destroy and recreate the persistent collection
#[inline]
pub async fn clear(confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Refusing to clear the database without --yes");
    }

    let service = build_service().await?;
    service
        .clear_database()
        .await
        .context("Failed to clear the database")?;

    println!("Database cleared.");
    Ok(())
}

/// Print the resolved configuration with the API key redacted
#[inline]
pub fn show_config() -> Result<()> {
    let mut config = load_config()?;
    if config.openrouter.api_key.is_some() {
        config.openrouter.api_key = Some("<redacted>".to_string());
    }

    print_json(&config)
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    Config::load(&config_dir)
}

async fn build_service() -> Result<RagService> {
    let config = load_config()?;
    RagService::new(config)
        .await
        .context("Failed to initialize RAG service")
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Path has no file name: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
