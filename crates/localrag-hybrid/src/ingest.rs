use std::sync::Arc;

use localrag_core::config::TimeoutSettings;
use localrag_core::error::{call, Capability, Error, Result};
use localrag_core::traits::{Embedder, PassageSink};
use localrag_core::types::Passage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub passages: usize,
    pub batches: usize,
}

/// Embeds passages in batches and writes each batch to every sink.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    sinks: Vec<Arc<dyn PassageSink>>,
    batch_size: usize,
    timeouts: TimeoutSettings,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self { embedder, sinks: Vec::new(), batch_size: batch_size.max(1), timeouts: TimeoutSettings::default() }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PassageSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutSettings) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// `on_batch` receives the number of passages finished so far.
    pub async fn ingest<F>(&self, passages: Vec<Passage>, mut on_batch: F) -> Result<IngestReport>
    where
        F: FnMut(usize) + Send,
    {
        let mut report = IngestReport::default();
        let dim = self.embedder.dim();
        for chunk in passages.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|p| p.text.clone()).collect();
            let vectors = call(Capability::Embedder, self.timeouts.embed(), self.embedder.embed(&texts)).await?;
            if vectors.len() != chunk.len() {
                return Err(Error::capability(
                    Capability::Embedder,
                    anyhow::anyhow!("embedder returned {} vectors for {} passages", vectors.len(), chunk.len()),
                ));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::capability(
                    Capability::Embedder,
                    anyhow::anyhow!("dim mismatch: got {} expected {}", bad.len(), dim),
                ));
            }
            let embedded: Vec<Passage> =
                chunk.iter().cloned().zip(vectors).map(|(p, v)| p.with_embedding(v)).collect();
            for sink in &self.sinks {
                sink.index(&embedded).await.map_err(|e| Error::capability(Capability::PassageStore, e))?;
            }
            report.passages += embedded.len();
            report.batches += 1;
            on_batch(report.passages);
        }
        tracing::info!(passages = report.passages, batches = report.batches, sinks = self.sinks.len(), "ingest finished");
        Ok(report)
    }
}
