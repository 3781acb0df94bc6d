use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{TantivyDocument, Term};

use localrag_core::traits::LexicalSearch;
use localrag_core::types::{SearchHit, SourceKind};

use crate::index::TantivyLexicalIndex;

const MIN_FUZZY_LEN: usize = 4;

impl TantivyLexicalIndex {
    /// Analyze `query` with the text field's tokenizer.
    pub fn query_terms(&self, query: &str) -> Result<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.text_field)?;
        let mut stream = analyzer.token_stream(query);
        let mut terms = Vec::new();
        while stream.advance() {
            let text = stream.token().text.clone();
            if !terms.contains(&text) {
                terms.push(text);
            }
        }
        Ok(terms)
    }

    /// BM25 term matches, each paired with an edit-distance match so
    /// misspellings still retrieve.
    fn build_query(&self, terms: &[String]) -> BooleanQuery {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for t in terms {
            let term = Term::from_field_text(self.text_field, t);
            clauses.push((Occur::Should, Box::new(TermQuery::new(term.clone(), IndexRecordOption::WithFreqs))));
            if self.fuzzy_distance > 0 && t.chars().count() >= MIN_FUZZY_LEN {
                clauses.push((Occur::Should, Box::new(FuzzyTermQuery::new(term, self.fuzzy_distance, true))));
            }
        }
        BooleanQuery::new(clauses)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let terms = self.query_terms(query)?;
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let top_docs = searcher.search(&self.build_query(&terms), &TopDocs::with_limit(limit))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let field = |f: Field| doc.get_first(f).and_then(|v| v.as_str()).unwrap_or("").to_string();
            hits.push(SearchHit {
                id: field(self.id_field),
                document_id: field(self.doc_id_field),
                text: field(self.text_field),
                score,
                source: SourceKind::Text,
            });
        }
        Ok(hits)
    }
}

#[async_trait]
impl LexicalSearch for TantivyLexicalIndex {
    /// Runs on the blocking pool so a caller's deadline can fire while
    /// tantivy is still scoring.
    async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let this = self.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || this.search(&query, limit))
            .await
            .map_err(|e| anyhow!("tantivy search task failed: {e}"))?
    }
}
