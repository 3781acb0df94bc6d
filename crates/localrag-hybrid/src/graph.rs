use std::collections::BTreeSet;

use localrag_core::error::{call, Capability, Result};
use localrag_core::traits::{GraphStore, PassageStore};
use localrag_core::types::{NodeId, PassageId, RankedCandidate};

use crate::fusion::sort_candidates;
use crate::retriever::HybridRetriever;

/// Flat prior given to passages reached through the graph.
pub const EXPANSION_SCORE: f32 = 0.5;

/// One-hop graph expansion around a hybrid retrieval.
pub struct GraphExpander<'a> {
    retriever: &'a HybridRetriever,
    graph: &'a dyn GraphStore,
    passages: &'a dyn PassageStore,
}

impl<'a> GraphExpander<'a> {
    pub fn new(retriever: &'a HybridRetriever, graph: &'a dyn GraphStore, passages: &'a dyn PassageStore) -> Self {
        Self { retriever, graph, passages }
    }

    /// Base retrieval with `top_k = node_limit`, extended by passages of the
    /// base nodes and their outgoing neighbours.
    ///
    /// Extras only fill slots the base set leaves free, so every base
    /// candidate survives. When the base retrieval already returns
    /// `node_limit` candidates there is no free slot and the graph is not
    /// consulted at all. Any lookup failure aborts the expansion.
    pub async fn expand(&self, query: &str, node_limit: usize, hop_chunk_limit: usize) -> Result<Vec<RankedCandidate>> {
        let mut results = self.retriever.retrieve(query, node_limit).await?;
        if results.is_empty() {
            return Ok(results);
        }
        let free = node_limit.saturating_sub(results.len());
        let cap = hop_chunk_limit.saturating_mul(node_limit);
        if free == 0 || cap == 0 {
            return Ok(results);
        }
        let timeout = self.retriever.timeouts().graph();
        let base_ids: Vec<PassageId> = results.iter().map(|c| c.passage_id.clone()).collect();

        let nodes = call(Capability::Graph, timeout, self.graph.nodes_for_passages(&base_ids)).await?;
        if nodes.is_empty() {
            return Ok(results);
        }
        let neighbors = call(Capability::Graph, timeout, self.graph.outgoing_neighbors(&nodes)).await?;
        let expanded: Vec<NodeId> =
            nodes.into_iter().chain(neighbors).collect::<BTreeSet<_>>().into_iter().collect();

        let extra_ids =
            call(Capability::Graph, timeout, self.graph.passages_for_nodes(&expanded, &base_ids, cap)).await?;
        if extra_ids.is_empty() {
            return Ok(results);
        }
        let extras = call(Capability::PassageStore, timeout, self.passages.passages(&extra_ids)).await?;
        tracing::debug!(
            base = results.len(),
            nodes = expanded.len(),
            extras = extras.len(),
            "graph expansion"
        );

        results.extend(extras.into_iter().take(free).map(|p| RankedCandidate {
            passage_id: p.id,
            document_id: p.document_id,
            snippet: p.text,
            score: EXPANSION_SCORE,
        }));
        sort_candidates(&mut results);
        results.truncate(node_limit);
        Ok(results)
    }
}
