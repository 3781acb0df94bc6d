//! Exact-key memoization of query embeddings.
//!
//! Entries are keyed by the full input string, so a hit is only ever served
//! for byte-identical text. Bounded by entry count; moka evicts by TinyLFU.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use moka::sync::Cache;
use std::sync::Arc;

use localrag_core::traits::Embedder;

pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    entries: Cache<String, Vec<f32>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let entries = Cache::builder().max_capacity(capacity as u64).build();
        Self { inner, entries }
    }

    /// Entry count after pending inserts and evictions are applied.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut found: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.entries.get(t)).collect();
        let missing: Vec<String> = texts
            .iter()
            .zip(&found)
            .filter(|(_, hit)| hit.is_none())
            .map(|(t, _)| t.clone())
            .collect();
        if !missing.is_empty() {
            let computed = self.inner.embed(&missing).await?;
            if computed.len() != missing.len() {
                return Err(anyhow!("embedder returned {} vectors for {} inputs", computed.len(), missing.len()));
            }
            for (text, vector) in missing.into_iter().zip(&computed) {
                self.entries.insert(text, vector.clone());
            }
            let mut computed = computed.into_iter();
            for slot in found.iter_mut().filter(|s| s.is_none()) {
                *slot = computed.next();
            }
        }
        found
            .into_iter()
            .map(|v| v.ok_or_else(|| anyhow!("embedding missing after cache fill")))
            .collect()
    }
}
