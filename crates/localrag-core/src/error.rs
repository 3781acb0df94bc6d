use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// External capability a pipeline call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Embedder,
    VectorSearch,
    LexicalSearch,
    Graph,
    PassageStore,
    Generator,
    Reranker,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Embedder => "embedder",
            Self::VectorSearch => "vector search",
            Self::LexicalSearch => "lexical search",
            Self::Graph => "graph store",
            Self::PassageStore => "passage store",
            Self::Generator => "generator",
            Self::Reranker => "reranker",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{capability} call failed: {source}")]
    Capability {
        capability: Capability,
        #[source]
        source: anyhow::Error,
    },

    #[error("{capability} call timed out after {after:?}")]
    Timeout { capability: Capability, after: Duration },

    #[error("Rerank failed: {0}")]
    Rerank(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Coarse classification used at the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User-correctable.
    InvalidInput,
    /// Operator-actionable: a capability failed or timed out.
    Capability,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidConfig(_) | Self::NotFound(_) => ErrorKind::Config,
            Self::Capability { .. } | Self::Timeout { .. } | Self::Rerank(_) => ErrorKind::Capability,
        }
    }

    pub fn capability(capability: Capability, source: anyhow::Error) -> Self {
        Self::Capability { capability, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Await one external call under its own deadline.
///
/// Failures are tagged with the capability that produced them. Dropping the
/// returned future cancels the underlying call.
pub async fn call<T, F>(capability: Capability, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(Error::Capability { capability, source }),
        Err(_) => Err(Error::Timeout { capability, after: limit }),
    }
}
