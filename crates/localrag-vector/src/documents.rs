use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use localrag_core::traits::DocumentStore;
use localrag_core::types::{DocumentSummary, Passage};

use crate::writer::LanceStore;

/// SQL string literal with embedded quotes doubled. Lance deletes only take a
/// predicate string.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl DocumentStore for LanceStore {
    async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for p in self.scan_passages(|_, _| true).await? {
            *counts.entry(p.document_id).or_default() += 1;
        }
        Ok(counts.into_iter().map(|(document_id, passages)| DocumentSummary { document_id, passages }).collect())
    }

    async fn document_passages(&self, document_id: &str) -> Result<Vec<Passage>> {
        let mut passages = self.scan_passages(|_, doc| doc == document_id).await?;
        passages.sort_by_key(|p| p.ordinal);
        Ok(passages)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let removed = self.scan_passages(|_, doc| doc == document_id).await?.len();
        if removed == 0 {
            return Ok(0);
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        table.delete(&format!("doc_id = {}", quote_literal(document_id))).await?;
        tracing::info!(table = %self.table_name, document = document_id, removed, "lance document deleted");
        Ok(removed)
    }
}
