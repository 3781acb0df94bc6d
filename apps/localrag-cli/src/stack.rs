//! Opens the configured stores and capability clients.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use localrag_core::config::{resolve_with_base, EmbedderKind, Settings};
use localrag_core::error::Error;
use localrag_core::traits::Embedder;
use localrag_embed::{fake_embeddings_requested, local_embedder, with_cache};
use localrag_hybrid::HybridRetriever;
use localrag_memory::MemoryGraph;
use localrag_remote::OpenAiEmbedder;
use localrag_text::TantivyLexicalIndex;
use localrag_vector::LanceStore;

/// Resolved on-disk locations.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub corpus_dir: PathBuf,
    pub tantivy_dir: PathBuf,
    pub lancedb_dir: PathBuf,
    pub graph_file: PathBuf,
}

impl DataPaths {
    /// Relative paths are taken from `base`, normally the config file's directory.
    pub fn resolve(settings: &Settings, base: &Path) -> Self {
        let d = &settings.data;
        Self {
            corpus_dir: resolve_with_base(base, &d.corpus_dir),
            tantivy_dir: resolve_with_base(base, &d.tantivy_index_dir),
            lancedb_dir: resolve_with_base(base, &d.lancedb_dir),
            graph_file: resolve_with_base(base, &d.graph_file),
        }
    }
}

pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let embedder = &settings.embedder;
    if embedder.kind == EmbedderKind::Openai && !fake_embeddings_requested() {
        let remote = OpenAiEmbedder::from_settings(embedder).map_err(|e| Error::InvalidConfig(format!("{e:#}")))?;
        return Ok(with_cache(Arc::new(remote), embedder.cache_capacity));
    }
    local_embedder(embedder).map_err(|e| Error::InvalidConfig(format!("{e:#}")).into())
}

/// Read side of an ingested corpus.
pub struct Stack {
    pub settings: Settings,
    pub paths: DataPaths,
    pub embedder: Arc<dyn Embedder>,
    pub lance: Arc<LanceStore>,
    pub lexical: Arc<TantivyLexicalIndex>,
}

impl Stack {
    pub async fn open(settings: Settings, base: &Path) -> Result<Self> {
        let paths = DataPaths::resolve(&settings, base);
        if !paths.tantivy_dir.join("meta.json").exists() {
            return Err(Error::NotFound(format!(
                "no lexical index at {}; run `localrag ingest` first",
                paths.tantivy_dir.display()
            ))
            .into());
        }
        let lexical = Arc::new(TantivyLexicalIndex::open(&paths.tantivy_dir)?);
        let lance = Arc::new(LanceStore::open(&paths.lancedb_dir, &settings.data.table).await?);
        let embedder = build_embedder(&settings)?;
        Ok(Self { settings, paths, embedder, lance, lexical })
    }

    pub fn retriever(&self) -> Result<HybridRetriever> {
        Ok(HybridRetriever::from_settings(self.embedder.clone(), self.lance.clone(), self.lexical.clone(), &self.settings)?)
    }

    pub fn graph(&self) -> Result<MemoryGraph> {
        MemoryGraph::load(&self.paths.graph_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_the_base() {
        let paths = DataPaths::resolve(&Settings::default(), Path::new("/srv/rag"));
        assert_eq!(paths.corpus_dir, PathBuf::from("/srv/rag/data/corpus"));
        assert_eq!(paths.graph_file, PathBuf::from("/srv/rag/data/graph.json"));
    }
}
