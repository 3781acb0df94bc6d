//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K=8`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Effort, FusionWeights, QualityGate};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load `path` plus its `<stem>.<env>.toml` sibling, then `APP_*` variables.
    pub fn load_from(path: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let overlay = match env_name.as_str() {
            "dev" | "development" => Some("dev"),
            "prod" | "production" => Some("prod"),
            "test" | "testing" => Some("test"),
            _ => None,
        };

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        if let Some(suffix) = overlay {
            figment = figment.merge(Toml::file(path.with_extension(format!("{suffix}.toml"))));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub retrieval: RetrievalSettings,
    pub graph: GraphSettings,
    pub quality: QualityGate,
    pub embedder: EmbedderSettings,
    pub generator: GeneratorSettings,
    pub reranker: RerankerSettings,
    pub timeouts: TimeoutSettings,
    pub ingest: IngestSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.retrieval.weights().validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("retrieval.candidate_multiplier must be at least 1".into()));
        }
        if self.ingest.batch_size == 0 {
            return Err(Error::InvalidConfig("ingest.batch_size must be at least 1".into()));
        }
        if self.embedder.dim == 0 {
            return Err(Error::InvalidConfig("embedder.dim must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_dir: String,
    pub tantivy_index_dir: String,
    pub lancedb_dir: String,
    pub table: String,
    pub graph_file: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus_dir: "data/corpus".into(),
            tantivy_index_dir: "data/indexes/tantivy".into(),
            lancedb_dir: "data/indexes/lancedb".into(),
            table: "passages".into(),
            graph_file: "data/graph.json".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    pub top_k: usize,
    pub candidate_multiplier: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let w = FusionWeights::default();
        Self { semantic_weight: w.semantic, lexical_weight: w.lexical, top_k: 5, candidate_multiplier: 4 }
    }
}

impl RetrievalSettings {
    pub fn weights(&self) -> FusionWeights {
        FusionWeights { semantic: self.semantic_weight, lexical: self.lexical_weight }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub node_limit: usize,
    pub hop_chunk_limit: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self { node_limit: 10, hop_chunk_limit: 2 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedderKind {
    /// Deterministic feature-hashing embedder; no model files needed.
    #[default]
    Hash,
    BgeM3,
    Openai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderSettings {
    pub kind: EmbedderKind,
    pub dim: usize,
    pub model_dir: Option<String>,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    /// Exact-match query embedding cache size; 0 disables the cache.
    pub cache_capacity: usize,
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::Hash,
            dim: 1024,
            model_dir: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            cache_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub base_url: String,
    pub model: String,
    pub effort: Effort,
    pub api_key_env: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            effort: Effort::Minimal,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.cohere.com/v1".into(),
            model: "rerank-english-v3.0".into(),
            api_key_env: "COHERE_API_KEY".into(),
        }
    }
}

/// Per-call deadlines, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub embed_ms: u64,
    pub search_ms: u64,
    pub graph_ms: u64,
    pub rerank_ms: u64,
    pub generate_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self { embed_ms: 30_000, search_ms: 10_000, graph_ms: 10_000, rerank_ms: 30_000, generate_ms: 120_000 }
    }
}

impl TimeoutSettings {
    pub fn embed(&self) -> Duration {
        Duration::from_millis(self.embed_ms)
    }

    pub fn search(&self) -> Duration {
        Duration::from_millis(self.search_ms)
    }

    pub fn graph(&self) -> Duration {
        Duration::from_millis(self.graph_ms)
    }

    pub fn rerank(&self) -> Duration {
        Duration::from_millis(self.rerank_ms)
    }

    pub fn generate(&self) -> Duration {
        Duration::from_millis(self.generate_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkerKind {
    Sentence,
    Markdown,
    #[default]
    Paragraph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub chunker: ChunkerKind,
    pub batch_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { chunker: ChunkerKind::Paragraph, batch_size: 32 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
