//! LanceDB-backed passage table.
//!
//! One table holds passage text, metadata and the embedding column. The
//! same table serves vector search, passage lookup by id and
//! document-level listing and deletion.

pub mod documents;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use writer::LanceStore;
