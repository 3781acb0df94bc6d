use std::collections::HashMap;

use localrag_core::types::RankedCandidate;

/// Derives the next query when the evidence is too weak.
pub trait QueryRefiner: Send + Sync {
    fn refine(&self, question: &str, results: &[RankedCandidate]) -> String;
}

/// Appends the most frequent longer words of the current snippets.
#[derive(Debug, Clone)]
pub struct TermFrequencyRefiner {
    pub terms: usize,
    pub min_len: usize,
}

impl Default for TermFrequencyRefiner {
    fn default() -> Self {
        Self { terms: 3, min_len: 4 }
    }
}

impl TermFrequencyRefiner {
    /// Top terms by count; equal counts keep first-occurrence order.
    pub fn top_terms(&self, results: &[RankedCandidate]) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for snippet in results.iter().map(|r| r.snippet.to_lowercase()) {
            for token in snippet.split(|c: char| !c.is_alphanumeric()) {
                if token.chars().count() < self.min_len {
                    continue;
                }
                let n = counts.entry(token.to_string()).or_insert(0);
                if *n == 0 {
                    order.push(token.to_string());
                }
                *n += 1;
            }
        }
        order.sort_by_key(|t| std::cmp::Reverse(counts[t]));
        order.truncate(self.terms);
        order
    }
}

impl QueryRefiner for TermFrequencyRefiner {
    fn refine(&self, question: &str, results: &[RankedCandidate]) -> String {
        let terms = self.top_terms(results);
        format!("{question} {}", terms.join(" ")).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(text: &str) -> RankedCandidate {
        RankedCandidate { passage_id: "p".into(), document_id: "d".into(), snippet: text.into(), score: 0.1 }
    }

    #[test]
    fn most_frequent_terms_are_appended() {
        let results = [snippet("Boil water. Water boils fast."), snippet("Filter the WATER; boil it, then filter again.")];
        assert_eq!(TermFrequencyRefiner::default().refine("how to purify?", &results), "how to purify? water filter boils");
    }

    #[test]
    fn ties_keep_first_occurrence() {
        let results = [snippet("delta alpha gamma beta")];
        assert_eq!(TermFrequencyRefiner::default().top_terms(&results), ["delta", "alpha", "gamma"]);
    }

    #[test]
    fn nothing_to_extract_leaves_question() {
        assert_eq!(TermFrequencyRefiner::default().refine("why", &[snippet("a an the of")]), "why");
        assert_eq!(TermFrequencyRefiner::default().refine("why", &[]), "why");
    }
}
