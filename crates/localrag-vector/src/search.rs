use anyhow::Result;
use arrow_array::Array;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use std::collections::{HashMap, HashSet};

use localrag_core::traits::{PassageStore, VectorSearch};
use localrag_core::types::{Passage, PassageId, SearchHit, SourceKind};

use crate::table::{f32_col, i32_col, string_col, table_exists};
use crate::writer::LanceStore;

impl LanceStore {
    /// Cosine nearest neighbours; `score = 1 - distance`.
    pub async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 || !table_exists(&self.db, &self.table_name).await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table
            .vector_search(embedding.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = string_col(&batch, "id")?;
            let doc_ids = string_col(&batch, "doc_id")?;
            let contents = string_col(&batch, "content")?;
            let distances = f32_col(&batch, "_distance")?;
            for i in 0..batch.num_rows() {
                hits.push(SearchHit {
                    id: ids.value(i).to_string(),
                    document_id: doc_ids.value(i).to_string(),
                    text: contents.value(i).to_string(),
                    score: 1.0 - distances.value(i),
                    source: SourceKind::Vector,
                });
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Fetch passages by id, preserving request order. Embeddings are not
    /// loaded.
    pub async fn fetch(&self, ids: &[PassageId]) -> Result<Vec<Passage>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let found: HashMap<String, Passage> = self
            .scan_passages(|id, _| wanted.contains(id))
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    /// Full scan with an in-memory row filter on `(id, doc_id)`; values never
    /// reach a SQL predicate. Embeddings are not loaded.
    pub(crate) async fn scan_passages<F>(&self, keep: F) -> Result<Vec<Passage>>
    where
        F: Fn(&str, &str) -> bool,
    {
        if !table_exists(&self.db, &self.table_name).await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table.query().execute().await?;
        let mut found = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let id_col = string_col(&batch, "id")?;
            let doc_col = string_col(&batch, "doc_id")?;
            let ord_col = i32_col(&batch, "ordinal")?;
            let heading_col = string_col(&batch, "heading")?;
            let content_col = string_col(&batch, "content")?;
            for i in 0..batch.num_rows() {
                if !keep(id_col.value(i), doc_col.value(i)) {
                    continue;
                }
                found.push(Passage {
                    id: id_col.value(i).to_string(),
                    document_id: doc_col.value(i).to_string(),
                    ordinal: usize::try_from(ord_col.value(i))?,
                    text: content_col.value(i).to_string(),
                    heading: (!heading_col.is_null(i)).then(|| heading_col.value(i).to_string()),
                    embedding: None,
                });
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl VectorSearch for LanceStore {
    async fn search_vector(&self, embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        self.search(embedding, limit).await
    }
}

#[async_trait]
impl PassageStore for LanceStore {
    async fn passages(&self, ids: &[PassageId]) -> Result<Vec<Passage>> {
        self.fetch(ids).await
    }
}
