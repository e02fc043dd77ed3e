// LanceDB vector database module
// Collections are LanceDB tables with a fixed-dimension vector column

pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::chunking::DocumentChunk;

pub use vector_store::{ScoredChunk, VectorStore};

/// Metadata persisted alongside each vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkPayload {
    /// The chunk text
    pub text: String,
    /// Logical origin identifier (filename or "web")
    pub source: String,
    /// 0-based ordinal within the source
    pub chunk_index: u32,
    /// Chunk count for the ingestion run; null for streaming ingestion
    pub total_chunks: Option<u32>,
    /// 0-based page number for paginated sources
    pub page: Option<u32>,
    /// Timestamp when this record was created
    pub created_at: String,
}

impl From<&DocumentChunk> for ChunkPayload {
    #[inline]
    fn from(chunk: &DocumentChunk) -> Self {
        Self {
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
            page: chunk.page,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Aggregated listing entry for one source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: String,
    pub document_count: usize,
}
