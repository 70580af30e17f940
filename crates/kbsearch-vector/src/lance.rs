//! Embedded LanceDB collection.
//!
//! The table is named after the collection and follows the schema in
//! `schema.rs`. Searches use cosine distance; similarity is `1 - distance`.

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use kbsearch_core::{Error, ProviderInfo, Result, SearchCandidate, VectorStore};

use crate::record::{KnowledgeRecord, RecordOptions};
use crate::schema::{self, build_arrow_schema, vector_dim};
use crate::sort_by_similarity;

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(e.to_string())
}

pub struct LanceStore {
    uri: String,
    table_name: String,
    options: RecordOptions,
    conn: OnceCell<Connection>,
}

impl LanceStore {
    /// The connection is opened lazily on first use, so a bad path surfaces
    /// as `StoreUnavailable` on the request path instead of at startup.
    pub fn new(uri: &Path, table_name: &str, options: RecordOptions) -> Self {
        Self {
            uri: uri.to_string_lossy().to_string(),
            table_name: table_name.to_string(),
            options,
            conn: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<&Connection> {
        self.conn.get_or_try_init(|| async { connect(&self.uri).execute().await.map_err(store_err) }).await
    }

    async fn open_table(&self) -> Result<Table> {
        let conn = self.connection().await?;
        if !conn.table_names().execute().await.map_err(store_err)?.contains(&self.table_name) {
            return Err(Error::StoreUnavailable(format!("collection '{}' does not exist", self.table_name)));
        }
        conn.open_table(&self.table_name).execute().await.map_err(store_err)
    }

    async fn table_dim(table: &Table) -> Result<usize> {
        let schema = table.schema().await.map_err(store_err)?;
        vector_dim(&schema).ok_or_else(|| Error::StoreUnavailable("collection has no embedding column".into()))
    }

    /// Collection dimension as declared by the table schema.
    pub async fn dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        Self::table_dim(&table).await
    }

    /// Append records, creating the collection from the first record's
    /// dimension if it does not exist yet. Returns the number written.
    pub async fn add_records(&self, records: &[KnowledgeRecord]) -> Result<usize> {
        let Some(first) = records.first() else { return Ok(0) };
        let dim = first.embedding.len();
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.embedding.len() });
        }
        let batch = records_to_batch(records, dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));

        if self.exists().await? {
            let table = self.open_table().await?;
            let expected = Self::table_dim(&table).await?;
            if expected != dim {
                return Err(Error::DimensionMismatch { expected, actual: dim });
            }
            table.add(reader).execute().await.map_err(store_err)?;
        } else {
            self.connection().await?.create_table(&self.table_name, reader).execute().await.map_err(store_err)?;
        }
        debug!(table = %self.table_name, rows = records.len(), "records added");
        Ok(records.len())
    }

    fn batch_to_candidates(&self, batch: &RecordBatch, out: &mut Vec<SearchCandidate>) -> Result<()> {
        let strings = |name: &str| {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| Error::StoreUnavailable(format!("result batch missing column '{name}'")))
        };
        let ids = strings(schema::ID)?;
        let titles = strings(schema::TITLE)?;
        let contents = strings(schema::CONTENT)?;
        let sources = strings(schema::SOURCE)?;
        let file_paths = strings(schema::FILE_PATH).ok();
        let pages = batch.column_by_name(schema::PAGE_NUMBER).and_then(|c| c.as_any().downcast_ref::<Int32Array>());
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| Error::StoreUnavailable("result batch missing '_distance'".into()))?;

        for i in 0..batch.num_rows() {
            let page_number = pages.filter(|p| !p.is_null(i)).and_then(|p| u32::try_from(p.value(i)).ok());
            let file_path = file_paths.filter(|p| !p.is_null(i)).map(|p| p.value(i).to_string());
            out.push(SearchCandidate {
                id: ids.value(i).to_string(),
                title: self.options.title(Some(titles.value(i))),
                content: self.options.snippet(contents.value(i)),
                source: self.options.source(Some(sources.value(i))),
                page_number,
                file_path,
                similarity_score: 1.0 - distances.value(i),
            });
        }
        Ok(())
    }
}

fn records_to_batch(records: &[KnowledgeRecord], dim: usize) -> Result<RecordBatch> {
    let dim = i32::try_from(dim).map_err(|_| store_err(format!("embedding dimension {dim} is too large")))?;
    let schema = build_arrow_schema(dim);
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        records.iter().map(|r| Some(r.embedding.iter().copied().map(Some).collect::<Vec<_>>())),
        dim,
    );
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.title.as_str()))),
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.content.as_str()))),
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.source.as_str()))),
            Arc::new(Int32Array::from(
                records.iter().map(|r| r.page_number.and_then(|p| i32::try_from(p).ok())).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(records.iter().map(|r| r.file_path.as_deref()).collect::<Vec<_>>())),
            Arc::new(vectors) as Arc<dyn Array>,
        ],
    )
    .map_err(store_err)
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchCandidate>> {
        let table = self.open_table().await?;
        let expected = Self::table_dim(&table).await?;
        if vector.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: vector.len() });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }
        let batches: Vec<RecordBatch> = table
            .vector_search(vector.to_vec())
            .map_err(store_err)?
            .column(schema::EMBEDDING)
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(store_err)?
            .try_collect()
            .await
            .map_err(store_err)?;

        let mut candidates = Vec::new();
        for batch in &batches {
            self.batch_to_candidates(batch, &mut candidates)?;
        }
        sort_by_similarity(&mut candidates);
        candidates.truncate(limit);
        debug!(table = %self.table_name, hits = candidates.len(), "lance search");
        Ok(candidates)
    }

    async fn exists(&self) -> Result<bool> {
        let conn = self.connection().await?;
        Ok(conn.table_names().execute().await.map_err(store_err)?.contains(&self.table_name))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("LanceDB")
            .with("uri", &self.uri)
            .with("collection", &self.table_name)
            .with("metric", "cosine")
    }
}
