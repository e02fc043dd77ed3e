
use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use itertools::izip;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use tracing::{debug, info, warn};

use super::{ChunkPayload, SourceSummary};
use crate::config::Config;
use crate::{RagError, Result};

/// Upper bound on rows visited by full-collection scans (delete-by-source id
/// resolution and source listing)
const SCAN_LIMIT: usize = 10_000;

/// Adapter owning one named collection in the vector database.
///
/// The collection is created lazily with the configured dimension and cosine
/// distance on first open. Concurrent writers rely on the store's own
/// per-operation atomicity; there is no in-process locking.
pub struct VectorStore {
    connection: Connection,
    collection: String,
    dimension: usize,
}

/// One search hit, best match first in the containing list
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub payload: ChunkPayload,
    pub similarity: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the persistent collection named in the configuration
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_collection(config, &config.storage.collection).await
    }

    /// Open (creating if absent) a named collection.
    ///
    /// Idempotent: reopening an existing collection is a no-op, and an
    /// existing table's dimension wins over the configured one.
    #[inline]
    pub async fn open_collection(config: &Config, collection: &str) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("Opening LanceDB at {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            collection: collection.to_string(),
            dimension: config.openrouter.embedding_dimension as usize,
        };

        store.ensure_collection().await?;

        debug!(
            "Collection '{}' ready ({} dimensions)",
            store.collection, store.dimension
        );
        Ok(store)
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create the collection if absent; detect the dimension of an existing one
    async fn ensure_collection(&mut self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.collection) {
            let existing = self.detect_existing_dimension().await?;
            if existing != self.dimension {
                warn!(
                    "Collection '{}' has dimension {}, overriding configured {}",
                    self.collection, existing, self.dimension
                );
                self.dimension = existing;
            }
            return Ok(());
        }

        info!(
            "Creating collection '{}' with {} dimensions",
            self.collection, self.dimension
        );

        let schema = self.create_schema();
        self.connection
            .create_empty_table(&self.collection, schema)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create collection: {}", e)))?;

        Ok(())
    }

    async fn detect_existing_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::Database(format!(
            "Collection '{}' has no vector column",
            self.collection
        )))
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("total_chunks", DataType::UInt32, true),
            Field::new("page", DataType::UInt32, true),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Write or overwrite records by id.
    ///
    /// The three sequences must have equal length; every vector must match the
    /// collection dimension.
    #[inline]
    pub async fn upsert(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        payloads: &[ChunkPayload],
    ) -> Result<()> {
        if ids.len() != vectors.len() || ids.len() != payloads.len() {
            return Err(RagError::Database(format!(
                "Mismatched upsert lengths: {} ids, {} vectors, {} payloads",
                ids.len(),
                vectors.len(),
                payloads.len()
            )));
        }

        if ids.is_empty() {
            debug!("No records to upsert");
            return Ok(());
        }

        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        let record_batch = self.create_record_batch(ids, vectors, payloads)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self.open_table().await?;
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Database(format!("Failed to upsert records: {}", e)))?;

        debug!(
            "Upserted {} record(s) into '{}'",
            ids.len(),
            self.collection
        );
        Ok(())
    }

    /// Nearest-neighbor search by cosine distance, optionally restricted to
    /// records whose `source` equals `source_filter` exactly.
    ///
    /// Results come back most similar first; ties follow store order.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        if query_vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        debug!(
            "Searching '{}' (top_k {}, filter {:?})",
            self.collection, top_k, source_filter
        );

        let table = self.open_table().await?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .column("vector")
            .limit(top_k);

        if let Some(source) = source_filter {
            query = query.only_if(source_predicate(source));
        }

        let mut stream = query
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        debug!("Search returned {} result(s)", results.len());
        Ok(results)
    }

    /// Remove exactly the given ids; missing ids are no-ops
    #[inline]
    pub async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let id_list = ids
            .iter()
            .map(|id| format!("'{}'", escape_literal(id)))
            .collect::<Vec<_>>()
            .join(", ");
        let predicate = format!("id IN ({})", id_list);

        let table = self.open_table().await?;
        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Database(format!("Failed to delete by ids: {}", e)))?;

        debug!("Deleted {} id(s) from '{}'", ids.len(), self.collection);
        Ok(())
    }

    /// Remove all records for one source.
    ///
    /// Resolves matching ids first (scan capped at `SCAN_LIMIT`), then deletes
    /// by filter, and returns the resolved count. Records inserted
    /// concurrently during the scan may be missed; the count is best-effort.
    #[inline]
    pub async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let table = self.open_table().await?;
        let predicate = source_predicate(source);

        let mut stream = table
            .query()
            .only_if(predicate.clone())
            .select(Select::Columns(vec!["id".to_string()]))
            .limit(SCAN_LIMIT)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to scan ids for source: {}", e)))?;

        let mut count = 0usize;
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read scan stream: {}", e)))?
        {
            count += batch.num_rows();
        }

        if count == 0 {
            debug!("No records found for source '{}'", source);
            return Ok(0);
        }

        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Database(format!("Failed to delete by source: {}", e)))?;

        info!(
            "Deleted {} record(s) for source '{}' from '{}'",
            count, source, self.collection
        );
        Ok(count)
    }

    /// List distinct sources with their record counts, sorted by source name
    #[inline]
    pub async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let table = self.open_table().await?;

        let mut stream = table
            .query()
            .select(Select::Columns(vec!["source".to_string()]))
            .limit(SCAN_LIMIT)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to scan sources: {}", e)))?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read scan stream: {}", e)))?
        {
            let sources = string_column(&batch, "source")?;
            for row in 0..batch.num_rows() {
                *counts.entry(sources.value(row).to_string()).or_insert(0) += 1;
            }
        }

        let mut summaries: Vec<SourceSummary> = counts
            .into_iter()
            .map(|(source, document_count)| SourceSummary {
                source,
                document_count,
            })
            .collect();
        summaries.sort_by(|a, b| a.source.cmp(&b.source));

        Ok(summaries)
    }

    /// Total number of records in the collection
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Destroy and recreate the collection with its original dimension.
    ///
    /// Full reset only; not transactional with concurrent writers.
    #[inline]
    pub async fn clear_collection(&self) -> Result<()> {
        info!("Clearing collection '{}'", self.collection);

        self.drop_collection().await?;

        let schema = self.create_schema();
        self.connection
            .create_empty_table(&self.collection, schema)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to recreate collection: {}", e)))?;

        Ok(())
    }

    /// Drop the collection entirely; dropping an absent collection is a no-op
    #[inline]
    pub async fn drop_collection(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.collection) {
            self.connection
                .drop_table(&self.collection)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop collection: {}", e)))?;
            debug!("Dropped collection '{}'", self.collection);
        }

        Ok(())
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open collection: {}", e)))
    }

    fn create_record_batch(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        payloads: &[ChunkPayload],
    ) -> Result<RecordBatch> {
        let len = ids.len();

        let mut id_values = Vec::with_capacity(len);
        let mut flat_vector_values = Vec::with_capacity(len * self.dimension);
        let mut texts = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut total_chunks = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for (id, vector, payload) in izip!(ids, vectors, payloads) {
            id_values.push(id.as_str());
            flat_vector_values.extend_from_slice(vector);
            texts.push(payload.text.as_str());
            sources.push(payload.source.as_str());
            chunk_indices.push(payload.chunk_index);
            total_chunks.push(payload.total_chunks);
            pages.push(payload.page);
            created_ats.push(payload.created_at.as_str());
        }

        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_vector_values)),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(id_values)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(UInt32Array::from(total_chunks)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let total_chunks = u32_column(batch, "total_chunks")?;
    let pages = u32_column(batch, "page")?;
    let created_ats = string_column(batch, "created_at")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let payload = ChunkPayload {
            text: texts.value(row).to_string(),
            source: sources.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            total_chunks: (!total_chunks.is_null(row)).then_some(total_chunks.value(row)),
            page: (!pages.is_null(row)).then_some(pages.value(row)),
            created_at: created_ats.value(row).to_string(),
        };

        let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        results.push(ScoredChunk {
            id: ids.value(row).to_string(),
            payload,
            similarity: 1.0 - distance,
            distance,
        });
    }

    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn source_predicate(source: &str) -> String {
    format!("source = '{}'", escape_literal(source))
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
