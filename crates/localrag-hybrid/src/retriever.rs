use std::sync::Arc;

use localrag_core::config::{Settings, TimeoutSettings};
use localrag_core::error::{call, Capability, Error, Result};
use localrag_core::progress::{NoProgress, PipelineEvent, ProgressSink, Stage};
use localrag_core::traits::{Embedder, LexicalSearch, VectorSearch};
use localrag_core::types::{FusionWeights, RankedCandidate};

use crate::fusion::fuse;

pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 4;

/// Vector + lexical retrieval fused into one ranking.
///
/// Holds configuration only; every call is independent.
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorSearch>,
    lexical: Arc<dyn LexicalSearch>,
    weights: FusionWeights,
    candidate_multiplier: usize,
    timeouts: TimeoutSettings,
}

impl HybridRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, vector: Arc<dyn VectorSearch>, lexical: Arc<dyn LexicalSearch>) -> Self {
        Self {
            embedder,
            vector,
            lexical,
            weights: FusionWeights::default(),
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            timeouts: TimeoutSettings::default(),
        }
    }

    pub fn from_settings(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorSearch>,
        lexical: Arc<dyn LexicalSearch>,
        settings: &Settings,
    ) -> Result<Self> {
        let weights = settings.retrieval.weights();
        weights.validate()?;
        Ok(Self::new(embedder, vector, lexical)
            .with_weights(weights)
            .with_candidate_multiplier(settings.retrieval.candidate_multiplier)
            .with_timeouts(settings.timeouts.clone()))
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutSettings) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    pub fn timeouts(&self) -> &TimeoutSettings {
        &self.timeouts
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RankedCandidate>> {
        self.retrieve_with_progress(query, top_k, &NoProgress).await
    }

    /// Blank queries and `top_k == 0` return an empty list without touching
    /// the embedder or either store.
    pub async fn retrieve_with_progress(
        &self,
        query: &str,
        top_k: usize,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<RankedCandidate>> {
        let query = query.trim();
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        progress.emit(PipelineEvent::Stage(Stage::Embedder));
        let embedding = self.embed_query(query).await?;

        progress.emit(PipelineEvent::Stage(Stage::Retriever));
        let limit = top_k.saturating_mul(self.candidate_multiplier);
        let search = self.timeouts.search();
        let (vector_hits, lexical_hits) = tokio::try_join!(
            call(Capability::VectorSearch, search, self.vector.search_vector(&embedding, limit)),
            call(Capability::LexicalSearch, search, self.lexical.search_text(query, limit)),
        )?;
        tracing::debug!(
            query,
            vector = vector_hits.len(),
            lexical = lexical_hits.len(),
            "retrieval candidates"
        );
        Ok(fuse(&vector_hits, &lexical_hits, self.weights, top_k))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let texts = [query.to_string()];
        let mut vectors = call(Capability::Embedder, self.timeouts.embed(), self.embedder.embed(&texts)).await?;
        if vectors.len() != 1 {
            return Err(Error::capability(
                Capability::Embedder,
                anyhow::anyhow!("expected 1 query embedding, got {}", vectors.len()),
            ));
        }
        Ok(vectors.swap_remove(0))
    }
}
