use anyhow::{anyhow, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use lancedb::Connection;
use std::path::Path;
use std::sync::Arc;

use localrag_core::traits::PassageSink;
use localrag_core::types::Passage;

use crate::schema::build_passage_schema;
use crate::table::{open_db, table_exists};

const INSERT_BATCH: usize = 1000;

/// Passage table in LanceDB: the vector side of hybrid retrieval and the
/// passage lookup used by graph expansion.
pub struct LanceStore {
    pub(crate) db: Connection,
    pub(crate) table_name: String,
}

impl LanceStore {
    pub async fn open(db_path: &Path, table_name: &str) -> Result<Self> {
        let db = open_db(db_path.to_string_lossy().as_ref()).await?;
        Ok(Self { db, table_name: table_name.to_string() })
    }

    /// Append embedded passages. Passages without an embedding are skipped;
    /// returns how many rows were written.
    pub async fn add_passages(&self, passages: &[Passage]) -> Result<usize> {
        let embedded: Vec<&Passage> = passages.iter().filter(|p| p.embedding.is_some()).collect();
        if embedded.len() < passages.len() {
            tracing::debug!(skipped = passages.len() - embedded.len(), "passages without embedding not written to lance");
        }
        let mut written = 0usize;
        for batch in embedded.chunks(INSERT_BATCH) {
            self.insert_batch(batch).await?;
            written += batch.len();
        }
        tracing::info!(table = %self.table_name, written, "lance passages written");
        Ok(written)
    }

    async fn insert_batch(&self, passages: &[&Passage]) -> Result<()> {
        let record_batch = to_record_batch(passages)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        if table_exists(&self.db, &self.table_name).await? {
            self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }
}

fn to_record_batch(passages: &[&Passage]) -> Result<RecordBatch> {
    let dim = passages
        .first()
        .and_then(|p| p.embedding.as_ref())
        .map(Vec::len)
        .ok_or_else(|| anyhow!("no embedded passages in batch"))?;
    let mut ids = Vec::with_capacity(passages.len());
    let mut doc_ids = Vec::with_capacity(passages.len());
    let mut ordinals = Vec::with_capacity(passages.len());
    let mut headings: Vec<Option<String>> = Vec::with_capacity(passages.len());
    let mut contents = Vec::with_capacity(passages.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(passages.len());
    for p in passages {
        let embedding = p.embedding.as_ref().ok_or_else(|| anyhow!("passage {} has no embedding", p.id))?;
        if embedding.len() != dim {
            return Err(anyhow!("passage {} has {} dims, expected {}", p.id, embedding.len(), dim));
        }
        ids.push(p.id.clone());
        doc_ids.push(p.document_id.clone());
        ordinals.push(i32::try_from(p.ordinal)?);
        headings.push(p.heading.clone());
        contents.push(p.text.clone());
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }
    let dim = i32::try_from(dim)?;
    let batch = RecordBatch::try_new(
        build_passage_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(Int32Array::from(ordinals)),
            Arc::new(StringArray::from(headings)),
            Arc::new(StringArray::from(contents)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ],
    )?;
    Ok(batch)
}

#[async_trait]
impl PassageSink for LanceStore {
    async fn index(&self, passages: &[Passage]) -> Result<()> {
        self.add_passages(passages).await.map(|_| ())
    }
}
