
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::RawDocument;

/// Separators tried in order, coarsest boundary first. The empty separator is
/// the hard-split fallback for text with no usable boundaries.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for document chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters of shared context between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// A chunk of source text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// The chunk text, never whitespace-only
    pub text: String,
    /// Logical origin of the chunk (filename or "web")
    pub source: String,
    /// 0-based ordinal within the source
    pub chunk_index: u32,
    /// Chunk count for the ingestion run; unknown during streaming ingestion
    pub total_chunks: Option<u32>,
    /// 0-based page number for paginated sources
    pub page: Option<u32>,
}

/// Boundary-aware text splitter with configurable size and overlap.
///
/// Prefers splitting at paragraph breaks, then line breaks, then word
/// boundaries, and falls back to a hard character split only when a single
/// unbroken run exceeds the chunk size.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap.min(config.chunk_size.saturating_sub(1)),
        }
    }

    /// Split text into chunks of at most `chunk_size` characters, with
    /// consecutive chunks sharing up to `chunk_overlap` characters of context.
    /// Whitespace-only chunks are dropped.
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chunks = self.split_recursive(text, &SEPARATORS);

        let chunks: Vec<String> = chunks
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        debug!(
            "Split {} chars into {} chunks (size {}, overlap {})",
            text.chars().count(),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);

        if separator.is_empty() {
            return self.hard_split(text);
        }

        let splits: Vec<&str> = text.split(separator).filter(|s| !s.is_empty()).collect();

        let mut chunks = Vec::new();
        let mut good_splits: Vec<&str> = Vec::new();

        for split in splits {
            if char_len(split) < self.chunk_size {
                good_splits.push(split);
            } else {
                if !good_splits.is_empty() {
                    chunks.extend(self.merge_splits(&good_splits, separator));
                    good_splits.clear();
                }
                // This piece alone exceeds the budget; descend to finer boundaries
                chunks.extend(self.split_recursive(split, remaining));
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits, separator));
        }

        chunks
    }

    /// Greedily pack splits into chunks, carrying overlap across boundaries
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for split in splits {
            let split_len = char_len(split);
            let added = split_len + if current.is_empty() { 0 } else { separator_len };

            if total + added > self.chunk_size && !current.is_empty() {
                chunks.push(current.join(separator));

                // Drop leading splits until what remains fits the overlap budget
                while total > self.chunk_overlap
                    || (total + split_len + separator_len > self.chunk_size && total > 0)
                {
                    let removed = char_len(current[0]);
                    total -= removed + if current.len() > 1 { separator_len } else { 0 };
                    current.remove(0);
                    if current.is_empty() {
                        break;
                    }
                }
            }

            total += split_len + if current.is_empty() { 0 } else { separator_len };
            current.push(split);
        }

        if !current.is_empty() {
            chunks.push(current.join(separator));
        }

        chunks
    }

    /// Fixed-stride split for text with no separator boundaries
    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Split loaded documents into ordered chunks, indexed per ingestion run.
///
/// Page numbers carry over from the source documents; `total_chunks` is filled
/// in once the whole run is known.
#[inline]
pub fn chunk_documents(documents: &[RawDocument], splitter: &TextSplitter) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for document in documents {
        for text in splitter.split_text(&document.text) {
            chunks.push(DocumentChunk {
                text,
                source: document.source.clone(),
                chunk_index: chunks.len() as u32,
                total_chunks: None,
                page: document.page,
            });
        }
    }

    let total = chunks.len() as u32;
    for chunk in &mut chunks {
        chunk.total_chunks = Some(total);
    }

    chunks
}

fn pick_separator<'a>(
    text: &str,
    separators: &'a [&'static str],
) -> (&'static str, &'a [&'static str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
