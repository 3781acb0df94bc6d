use std::sync::Arc;
use std::time::Duration;

use localrag_core::error::{call, Capability, Error, Result};
use localrag_core::traits::RerankJudge;
use localrag_core::types::RankedCandidate;

/// Reorders candidates by an external relevance judge.
pub struct Reranker {
    judge: Arc<dyn RerankJudge>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(judge: Arc<dyn RerankJudge>, timeout: Duration) -> Self {
        Self { judge, timeout }
    }

    /// Same elements, new order. The judge is not consulted for empty input,
    /// and any answer that is not a permutation is rejected.
    pub async fn rerank(&self, query: &str, candidates: Vec<RankedCandidate>) -> Result<Vec<RankedCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let documents: Vec<String> = candidates.iter().map(|c| c.snippet.clone()).collect();
        let order = call(Capability::Reranker, self.timeout, self.judge.rank(query, &documents)).await?;
        check_permutation(&order, candidates.len())?;

        let mut slots: Vec<Option<RankedCandidate>> = candidates.into_iter().map(Some).collect();
        order
            .into_iter()
            .map(|i| slots[i].take().ok_or_else(|| Error::Rerank(format!("index {i} repeated"))))
            .collect()
    }
}

fn check_permutation(order: &[usize], n: usize) -> Result<()> {
    if order.len() != n {
        return Err(Error::Rerank(format!("judge returned {} indices for {} candidates", order.len(), n)));
    }
    let mut seen = vec![false; n];
    for &i in order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => return Err(Error::Rerank(format!("index {i} repeated"))),
            None => return Err(Error::Rerank(format!("index {i} out of range for {n} candidates"))),
        }
    }
    Ok(())
}
