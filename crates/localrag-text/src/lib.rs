//! localrag-text
//!
//! Tantivy-based lexical index over passages: BM25 scoring with
//! edit-distance fuzzy term matching.

pub mod index;
pub mod search;
pub mod tantivy_utils;

pub use index::TantivyLexicalIndex;
