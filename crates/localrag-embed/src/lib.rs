//! localrag-embed
//!
//! Local embedding backends: a deterministic hash embedder for offline use and
//! tests, BGE-M3 on candle, and an exact-key cache wrapper for query texts.

pub mod cache;
pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use cache::CachedEmbedder;
pub use hash::HashEmbedder;
pub use model::BgeM3Embedder;
pub use pool::masked_mean_l2;

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;

use localrag_core::config::{EmbedderKind, EmbedderSettings};
use localrag_core::traits::Embedder;

/// Build the configured in-process embedder, wrapped in the query cache when
/// `cache_capacity > 0`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the hash embedder regardless of `kind`.
pub fn local_embedder(settings: &EmbedderSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = fake_embeddings_requested();
    let inner: Arc<dyn Embedder> = match (use_fake, settings.kind) {
        (true, _) | (false, EmbedderKind::Hash) => {
            tracing::info!(dim = settings.dim, "using hash embedder");
            Arc::new(HashEmbedder::new(settings.dim))
        }
        (false, EmbedderKind::BgeM3) => Arc::new(BgeM3Embedder::load(settings.model_dir.as_deref().map(Path::new))?),
        (false, EmbedderKind::Openai) => bail!("embedder kind 'openai' is served by a remote client, not a local model"),
    };
    Ok(with_cache(inner, settings.cache_capacity))
}

pub fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn with_cache(inner: Arc<dyn Embedder>, capacity: usize) -> Arc<dyn Embedder> {
    if capacity == 0 {
        inner
    } else {
        Arc::new(CachedEmbedder::new(inner, capacity))
    }
}
