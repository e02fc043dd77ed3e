// RAG orchestration module
// Coordinates loader -> embedder -> vector store for ingestion, and
// vector store -> chat model for question answering


use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunking::{DocumentChunk, TextSplitter, chunk_documents};
use crate::config::Config;
use crate::database::{ChunkPayload, SourceSummary, VectorStore};
use crate::loader::{DocumentSource, WEB_SOURCE, load_pdf_pages};
use crate::openrouter::{ChatClient, EmbeddingClient};
use crate::{RagError, Result};

/// Orchestrator over the document pipeline.
///
/// Owns the persistent collection plus the embedding and chat clients; the
/// temporary-file Q&A path opens a request-scoped collection on demand and
/// tears it down before returning.
pub struct RagService {
    config: Config,
    splitter: TextSplitter,
    embedder: EmbeddingClient,
    llm: ChatClient,
    store: VectorStore,
}

/// Result of one ingestion call
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestionSummary {
    pub status: String,
    pub filename: String,
    pub chunks_processed: usize,
    pub saved_to_db: bool,
    pub streaming: bool,
}

/// Retrieved contexts with their distinct sources, most relevant first
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RetrievalResult {
    pub contexts: Vec<String>,
    pub sources: Vec<String>,
}

/// Answer grounded in the persistent collection
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RagAnswer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub contexts: Vec<String>,
    pub contexts_used: usize,
}

/// Answer grounded in a single uploaded file via a temporary collection
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TemporaryAnswer {
    pub question: String,
    pub answer: String,
    pub source: String,
    pub contexts_used: usize,
    pub total_chunks: usize,
    pub temporary: bool,
}

/// Raw retrieval result without the answering step
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchResults {
    pub query: String,
    pub contexts: Vec<String>,
    pub sources: Vec<String>,
    pub contexts_used: usize,
}

impl RagService {
    /// Create the service against the persistent collection named in the
    /// configuration
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let store = VectorStore::open(&config).await?;
        let embedder = EmbeddingClient::new(&config.openrouter)?;
        let llm = ChatClient::new(&config.openrouter)?;
        let splitter = TextSplitter::new(&config.chunking);

        Ok(Self {
            config,
            splitter,
            embedder,
            llm,
            store,
        })
    }

    /// Ingest a file into the persistent collection.
    ///
    /// PDFs stream page-by-page: each page is chunked, embedded, and flushed
    /// to storage before the next page is touched, so a mid-document failure
    /// leaves the already-flushed pages durable. Other formats load, chunk,
    /// and embed the whole document in one pass.
    #[inline]
    pub async fn process_and_store(
        &self,
        content: Vec<u8>,
        filename: &str,
    ) -> Result<IngestionSummary> {
        let source = DocumentSource::from_file(filename, content)?;

        match &source {
            DocumentSource::Pdf { content, source } => {
                self.ingest_pdf_streaming(content, source).await
            }
            _ => self.ingest_batch(&source, filename).await,
        }
    }

    /// Fetch a web page and ingest it under the "web" source tag
    #[inline]
    pub async fn ingest_url(&self, url: &url::Url) -> Result<IngestionSummary> {
        let source = DocumentSource::Web(url.clone());
        self.ingest_batch(&source, WEB_SOURCE).await
    }

    async fn ingest_pdf_streaming(&self, content: &[u8], filename: &str) -> Result<IngestionSummary> {
        info!("Streaming ingestion of {}", filename);

        let pages = load_pdf_pages(content, filename)?;
        let mut chunks_processed = 0usize;

        for (page, text) in pages {
            let chunks: Vec<DocumentChunk> = self
                .splitter
                .split_text(&text)
                .into_iter()
                .enumerate()
                .map(|(i, chunk_text)| DocumentChunk {
                    text: chunk_text,
                    source: filename.to_string(),
                    chunk_index: (chunks_processed + i) as u32,
                    // Unknown until the whole document has streamed through
                    total_chunks: None,
                    page: Some(page),
                })
                .collect();

            if chunks.is_empty() {
                debug!("Page {} of {} produced no chunks", page, filename);
                continue;
            }

            self.store_chunks(&self.store, &chunks).await?;
            chunks_processed += chunks.len();

            debug!(
                "Flushed page {} of {} ({} chunk(s), {} total)",
                page,
                filename,
                chunks.len(),
                chunks_processed
            );
        }

        info!(
            "Ingested {} chunk(s) from {} (streaming)",
            chunks_processed, filename
        );

        Ok(IngestionSummary {
            status: "success".to_string(),
            filename: filename.to_string(),
            chunks_processed,
            saved_to_db: true,
            streaming: true,
        })
    }

    async fn ingest_batch(
        &self,
        source: &DocumentSource,
        filename: &str,
    ) -> Result<IngestionSummary> {
        let documents = source.load()?;
        let chunks = chunk_documents(&documents, &self.splitter);

        self.store_chunks(&self.store, &chunks).await?;

        info!("Ingested {} chunk(s) from {}", chunks.len(), filename);

        Ok(IngestionSummary {
            status: "success".to_string(),
            filename: filename.to_string(),
            chunks_processed: chunks.len(),
            saved_to_db: true,
            streaming: false,
        })
    }

    /// Answer a question from a single uploaded file without touching the
    /// persistent corpus.
    ///
    /// The file is ingested into a request-scoped collection (`tmp-<uuid>`),
    /// searched, and answered; the whole collection is dropped before this
    /// returns, on success and failure alike. Cleanup failures are logged and
    /// never displace the primary result.
    #[inline]
    pub async fn ask_with_temporary_file(
        &self,
        question: &str,
        content: Vec<u8>,
        filename: &str,
        top_k: Option<usize>,
    ) -> Result<TemporaryAnswer> {
        let collection = format!("tmp-{}", Uuid::new_v4());
        debug!("Opening temporary collection '{}'", collection);

        let store = VectorStore::open_collection(&self.config, &collection).await?;

        let result = self
            .answer_from_temporary(&store, question, content, filename, top_k)
            .await;

        if let Err(e) = store.drop_collection().await {
            warn!("Failed to drop temporary collection '{}': {}", collection, e);
        }

        result
    }

    async fn answer_from_temporary(
        &self,
        store: &VectorStore,
        question: &str,
        content: Vec<u8>,
        filename: &str,
        top_k: Option<usize>,
    ) -> Result<TemporaryAnswer> {
        let source = DocumentSource::from_file(filename, content)?;
        let documents = source.load()?;
        let chunks = chunk_documents(&documents, &self.splitter);
        let total_chunks = chunks.len();

        self.store_chunks(store, &chunks).await?;

        let retrieval = self
            .retrieve(store, question, self.resolve_top_k(top_k), Some(filename))
            .await?;
        let answer = self
            .llm
            .generate_answer(question, &retrieval.contexts, &retrieval.sources)?;

        Ok(TemporaryAnswer {
            question: question.to_string(),
            answer,
            source: filename.to_string(),
            contexts_used: retrieval.contexts.len(),
            total_chunks,
            temporary: true,
        })
    }

    /// Answer a question from the persistent collection, optionally restricted
    /// to one source file
    #[inline]
    pub async fn ask_from_database(
        &self,
        question: &str,
        top_k: Option<usize>,
        filename: Option<&str>,
    ) -> Result<RagAnswer> {
        let retrieval = self
            .retrieve(&self.store, question, self.resolve_top_k(top_k), filename)
            .await?;
        let answer = self
            .llm
            .generate_answer(question, &retrieval.contexts, &retrieval.sources)?;

        Ok(RagAnswer {
            question: question.to_string(),
            answer,
            contexts_used: retrieval.contexts.len(),
            sources: retrieval.sources,
            contexts: retrieval.contexts,
        })
    }

    /// Raw retrieval from the persistent collection, no answering step
    #[inline]
    pub async fn search_in_database(
        &self,
        query: &str,
        top_k: Option<usize>,
        filename: Option<&str>,
    ) -> Result<SearchResults> {
        let retrieval = self
            .retrieve(&self.store, query, self.resolve_top_k(top_k), filename)
            .await?;

        Ok(SearchResults {
            query: query.to_string(),
            contexts_used: retrieval.contexts.len(),
            contexts: retrieval.contexts,
            sources: retrieval.sources,
        })
    }

    /// List distinct sources in the persistent collection with their record
    /// counts
    #[inline]
    pub async fn list_stored_files(&self) -> Result<Vec<SourceSummary>> {
        self.store.list_sources().await
    }

    /// Remove every record for one source; returns how many were removed
    #[inline]
    pub async fn forget_source(&self, source: &str) -> Result<usize> {
        self.store.delete_by_source(source).await
    }

    /// Destroy and recreate the persistent collection
    #[inline]
    pub async fn clear_database(&self) -> Result<()> {
        self.store.clear_collection().await
    }

    /// Embed chunk texts and upsert them as freshly-identified records
    async fn store_chunks(&self, store: &VectorStore, chunks: &[DocumentChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts)?;

        let ids: Vec<String> = chunks.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let payloads: Vec<ChunkPayload> = chunks.iter().map(ChunkPayload::from).collect();

        store.upsert(&ids, &vectors, &payloads).await
    }

    /// Embed the question and collect the nearest chunks.
    ///
    /// Empty chunk texts are skipped; sources keep first-seen order and are
    /// deduplicated.
    async fn retrieve(
        &self,
        store: &VectorStore,
        question: &str,
        top_k: usize,
        filename: Option<&str>,
    ) -> Result<RetrievalResult> {
        let query_vectors = self.embedder.embed_texts(&[question.to_string()])?;
        let query_vector = query_vectors
            .first()
            .ok_or_else(|| RagError::Embedding("No embedding returned for query".to_string()))?;

        let hits = store.search(query_vector, top_k, filename).await?;

        let mut contexts = Vec::with_capacity(hits.len());
        let mut sources = Vec::new();
        for hit in &hits {
            if hit.payload.text.trim().is_empty() {
                continue;
            }
            contexts.push(hit.payload.text.clone());
            if !sources.contains(&hit.payload.source) {
                sources.push(hit.payload.source.clone());
            }
        }

        debug!(
            "Retrieved {} context(s) from {} hit(s)",
            contexts.len(),
            hits.len()
        );

        Ok(RetrievalResult { contexts, sources })
    }

    fn resolve_top_k(&self, top_k: Option<usize>) -> usize {
        top_k.unwrap_or(self.config.storage.default_top_k).max(1)
    }
}
