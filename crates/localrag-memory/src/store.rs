use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use localrag_core::traits::{DocumentStore, GraphStore, LexicalSearch, PassageSink, PassageStore, VectorSearch};
use localrag_core::types::{DocumentSummary, NodeId, Passage, PassageId, SearchHit, SourceKind};

use crate::graph::MemoryGraph;
use crate::trigram::{self, DEFAULT_THRESHOLD};

/// Every store capability over process memory. Used for tests, small
/// corpora and the fake backend of the CLI.
pub struct MemoryStore {
    passages: RwLock<BTreeMap<PassageId, Passage>>,
    graph: RwLock<MemoryGraph>,
    lexical_threshold: f32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_graph(MemoryGraph::new())
    }

    pub fn with_graph(graph: MemoryGraph) -> Self {
        Self { passages: RwLock::new(BTreeMap::new()), graph: RwLock::new(graph), lexical_threshold: DEFAULT_THRESHOLD }
    }

    /// Minimum trigram similarity for a lexical hit.
    pub fn with_lexical_threshold(mut self, threshold: f32) -> Self {
        self.lexical_threshold = threshold;
        self
    }

    /// Insert or replace by id.
    pub async fn insert(&self, passage: Passage) {
        self.passages.write().await.insert(passage.id.clone(), passage);
    }

    pub async fn get(&self, id: &str) -> Option<Passage> {
        self.passages.read().await.get(id).cloned()
    }

    /// Remove a passage and its graph memberships.
    pub async fn remove(&self, id: &str) -> Option<Passage> {
        let removed = self.passages.write().await.remove(id);
        if removed.is_some() {
            self.graph.write().await.remove_passage(id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.passages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.passages.read().await.is_empty()
    }

    /// Mutable access to the graph, e.g. to add nodes and memberships.
    pub async fn graph_mut(&self) -> tokio::sync::RwLockWriteGuard<'_, MemoryGraph> {
        self.graph.write().await
    }

    pub async fn graph_snapshot(&self) -> localrag_core::types::GraphSnapshot {
        self.graph.read().await.to_snapshot()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn rank(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(limit);
    hits
}

#[async_trait]
impl VectorSearch for MemoryStore {
    async fn search_vector(&self, embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let passages = self.passages.read().await;
        let mut hits = Vec::new();
        for p in passages.values() {
            let Some(v) = &p.embedding else { continue };
            if v.len() != embedding.len() {
                bail!("passage {} has {} dims, query has {}", p.id, v.len(), embedding.len());
            }
            hits.push(SearchHit {
                id: p.id.clone(),
                document_id: p.document_id.clone(),
                text: p.text.clone(),
                score: cosine(embedding, v),
                source: SourceKind::Vector,
            });
        }
        Ok(rank(hits, limit))
    }
}

#[async_trait]
impl LexicalSearch for MemoryStore {
    async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let q = trigram::trigrams(query);
        let passages = self.passages.read().await;
        let hits = passages
            .values()
            .filter_map(|p| {
                let score = trigram::similarity_of(&q, &trigram::trigrams(&p.text));
                (score >= self.lexical_threshold && score > 0.0).then(|| SearchHit {
                    id: p.id.clone(),
                    document_id: p.document_id.clone(),
                    text: p.text.clone(),
                    score,
                    source: SourceKind::Text,
                })
            })
            .collect();
        Ok(rank(hits, limit))
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn nodes_for_passages(&self, passage_ids: &[PassageId]) -> Result<Vec<NodeId>> {
        Ok(self.graph.read().await.nodes_of(passage_ids))
    }

    async fn outgoing_neighbors(&self, node_ids: &[NodeId]) -> Result<Vec<NodeId>> {
        Ok(self.graph.read().await.neighbors_of(node_ids))
    }

    async fn passages_for_nodes(&self, node_ids: &[NodeId], exclude: &[PassageId], limit: usize) -> Result<Vec<PassageId>> {
        Ok(self.graph.read().await.passages_of(node_ids, exclude, limit))
    }
}

#[async_trait]
impl PassageStore for MemoryStore {
    async fn passages(&self, ids: &[PassageId]) -> Result<Vec<Passage>> {
        let passages = self.passages.read().await;
        Ok(ids.iter().filter_map(|id| passages.get(id).cloned()).collect())
    }
}

#[async_trait]
impl PassageSink for MemoryStore {
    async fn index(&self, passages: &[Passage]) -> Result<()> {
        let mut map = self.passages.write().await;
        for p in passages {
            map.insert(p.id.clone(), p.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let passages = self.passages.read().await;
        for p in passages.values() {
            *counts.entry(p.document_id.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(id, n)| DocumentSummary { document_id: id.to_string(), passages: n })
            .collect())
    }

    async fn document_passages(&self, document_id: &str) -> Result<Vec<Passage>> {
        let passages = self.passages.read().await;
        let mut found: Vec<Passage> = passages.values().filter(|p| p.document_id == document_id).cloned().collect();
        found.sort_by_key(|p| p.ordinal);
        Ok(found)
    }

    /// Also drops the removed passages' graph memberships.
    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut passages = self.passages.write().await;
        let ids: Vec<PassageId> =
            passages.values().filter(|p| p.document_id == document_id).map(|p| p.id.clone()).collect();
        let mut graph = self.graph.write().await;
        for id in &ids {
            passages.remove(id);
            graph.remove_passage(id);
        }
        Ok(ids.len())
    }
}
