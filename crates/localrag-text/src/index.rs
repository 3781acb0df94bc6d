use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use tantivy::schema::Field;
use tantivy::{doc, Index, IndexWriter, Term};

use localrag_core::traits::PassageSink;
use localrag_core::types::Passage;

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_MEMORY: usize = 50_000_000;

/// Tantivy index over passage text. Clones share the same underlying index.
#[derive(Clone)]
pub struct TantivyLexicalIndex {
    pub(crate) index: Index,
    pub(crate) id_field: Field,
    pub(crate) doc_id_field: Field,
    pub(crate) text_field: Field,
    /// Fuzzy matching edit distance for query terms of 4+ characters; 0 disables it.
    pub(crate) fuzzy_distance: u8,
}

impl TantivyLexicalIndex {
    /// Create a fresh index in `index_dir`, replacing anything already there.
    pub fn create(index_dir: &Path) -> Result<Self> {
        if index_dir.exists() {
            std::fs::remove_dir_all(index_dir)?;
        }
        std::fs::create_dir_all(index_dir)?;
        Self::from_index(Index::create_in_dir(index_dir, build_schema())?)
    }

    pub fn open(index_dir: &Path) -> Result<Self> {
        Self::from_index(Index::open_in_dir(index_dir)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    pub fn with_fuzzy_distance(mut self, distance: u8) -> Self {
        self.fuzzy_distance = distance;
        self
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizer(&index);
        let schema = index.schema();
        let id_field = schema.get_field("id")?;
        let doc_id_field = schema.get_field("doc_id")?;
        let text_field = schema.get_field("text")?;
        Ok(Self { index, id_field, doc_id_field, text_field, fuzzy_distance: 1 })
    }

    pub fn add_passages(&self, passages: &[Passage]) -> Result<()> {
        let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_MEMORY)?;
        for p in passages {
            writer.add_document(doc!(
                self.id_field => p.id.clone(),
                self.doc_id_field => p.document_id.clone(),
                self.text_field => p.text.clone(),
            ))?;
        }
        writer.commit()?;
        tracing::debug!(count = passages.len(), "indexed passages into tantivy");
        Ok(())
    }

    pub fn delete_document_blocking(&self, document_id: &str) -> Result<()> {
        let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_MEMORY)?;
        writer.delete_term(Term::from_field_text(self.doc_id_field, document_id));
        writer.commit()?;
        tracing::debug!(document = document_id, "deleted document from tantivy");
        Ok(())
    }

    /// Drop every passage of `document_id` from the index.
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        let this = self.clone();
        let document_id = document_id.to_string();
        tokio::task::spawn_blocking(move || this.delete_document_blocking(&document_id))
            .await
            .map_err(|e| anyhow!("tantivy writer task failed: {e}"))?
    }
}

#[async_trait]
impl PassageSink for TantivyLexicalIndex {
    async fn index(&self, passages: &[Passage]) -> Result<()> {
        let this = self.clone();
        let passages = passages.to_vec();
        tokio::task::spawn_blocking(move || this.add_passages(&passages))
            .await
            .map_err(|e| anyhow!("tantivy writer task failed: {e}"))?
    }
}
