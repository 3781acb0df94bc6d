//! Capability interfaces consumed by the pipeline.
//!
//! Implementations report failures through `anyhow`; the pipeline tags them
//! with the failing [`Capability`](crate::error::Capability) before they
//! reach a caller.

use async_trait::async_trait;

use crate::types::{DocumentSummary, NodeId, Passage, PassageId, SearchHit};

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    /// One vector per input, same order. Empty input yields empty output.
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Nearest passages by vector distance, best first, restricted to
    /// passages that carry an embedding. `score` is `1 - distance`.
    async fn search_vector(&self, embedding: &[f32], limit: usize) -> anyhow::Result<Vec<SearchHit>>;
}

#[async_trait]
pub trait LexicalSearch: Send + Sync {
    /// Fuzzy text-similarity search, best first.
    async fn search_text(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Read-only view of the passage/node graph. Every lookup is set-valued,
/// deduplicated and returned in ascending id order.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn nodes_for_passages(&self, passage_ids: &[PassageId]) -> anyhow::Result<Vec<NodeId>>;
    /// Targets of edges leaving any of `node_ids` (one hop).
    async fn outgoing_neighbors(&self, node_ids: &[NodeId]) -> anyhow::Result<Vec<NodeId>>;
    async fn passages_for_nodes(
        &self,
        node_ids: &[NodeId],
        exclude: &[PassageId],
        limit: usize,
    ) -> anyhow::Result<Vec<PassageId>>;
}

#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Passages for the given ids, in the order requested. Unknown ids are skipped.
    async fn passages(&self, ids: &[PassageId]) -> anyhow::Result<Vec<Passage>>;
}

/// Write side used by ingestion.
#[async_trait]
pub trait PassageSink: Send + Sync {
    async fn index(&self, passages: &[Passage]) -> anyhow::Result<()>;
}

/// Document-level listing and removal over stored passages.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every stored document with its passage count, ascending by id.
    async fn documents(&self) -> anyhow::Result<Vec<DocumentSummary>>;
    /// Passages of one document in ordinal order. Unknown ids yield empty.
    async fn document_passages(&self, document_id: &str) -> anyhow::Result<Vec<Passage>>;
    /// Remove every passage of the document; returns how many were removed.
    async fn delete_document(&self, document_id: &str) -> anyhow::Result<usize>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait RerankJudge: Send + Sync {
    /// Indices into `documents`, most relevant first.
    async fn rank(&self, query: &str, documents: &[String]) -> anyhow::Result<Vec<usize>>;
}
