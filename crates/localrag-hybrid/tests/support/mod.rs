#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use localrag_core::traits::{Embedder, LexicalSearch, VectorSearch};
use localrag_core::types::{SearchHit, SourceKind};
use localrag_hybrid::HybridRetriever;

pub fn hit(id: &str, score: f32, source: SourceKind) -> SearchHit {
    SearchHit { id: id.into(), document_id: format!("doc-{id}"), text: format!("text of {id}"), score, source }
}

#[derive(Default)]
pub struct CountingEmbedder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize {
        2
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Returns a fixed hit list (truncated to the limit) and counts calls.
pub struct FixedSearch {
    pub hits: Vec<SearchHit>,
    pub calls: AtomicUsize,
    pub last_limit: AtomicUsize,
}

impl FixedSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits, calls: AtomicUsize::new(0), last_limit: AtomicUsize::new(0) }
    }

    fn take(&self, limit: usize) -> Vec<SearchHit> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        self.hits.iter().take(limit).cloned().collect()
    }
}

#[async_trait]
impl VectorSearch for FixedSearch {
    async fn search_vector(&self, _embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.take(limit))
    }
}

#[async_trait]
impl LexicalSearch for FixedSearch {
    async fn search_text(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.take(limit))
    }
}

pub struct FailingSearch;

#[async_trait]
impl LexicalSearch for FailingSearch {
    async fn search_text(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        Err(anyhow!("connection refused"))
    }
}

pub struct Fixture {
    pub embedder: Arc<CountingEmbedder>,
    pub vector: Arc<FixedSearch>,
    pub lexical: Arc<FixedSearch>,
    pub retriever: HybridRetriever,
}

pub fn fixture(vector: Vec<SearchHit>, lexical: Vec<SearchHit>) -> Fixture {
    let embedder = Arc::new(CountingEmbedder::default());
    let vector = Arc::new(FixedSearch::new(vector));
    let lexical = Arc::new(FixedSearch::new(lexical));
    let retriever = HybridRetriever::new(embedder.clone(), vector.clone(), lexical.clone());
    Fixture { embedder, vector, lexical, retriever }
}
