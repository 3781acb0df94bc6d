//! Hybrid retrieval: score fusion, the retriever, graph expansion and
//! ingestion into the stores it reads from.

pub mod fusion;
pub mod graph;
pub mod ingest;
pub mod retriever;

pub use fusion::{fuse, min_max_normalize};
pub use graph::{GraphExpander, EXPANSION_SCORE};
pub use ingest::{IngestReport, Ingestor};
pub use retriever::HybridRetriever;
