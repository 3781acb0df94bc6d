//! In-process passage store and graph.

pub mod graph;
pub mod store;
pub mod trigram;

pub use graph::MemoryGraph;
pub use store::MemoryStore;
