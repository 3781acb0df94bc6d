mod support;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

use localrag_core::error::{Capability, Error};
use localrag_core::traits::{GraphStore, PassageSink};
use localrag_core::types::{GraphEdge, GraphNode, GraphSnapshot, NodeId, NodeMembership, Passage, PassageId, SourceKind};
use localrag_hybrid::{GraphExpander, HybridRetriever, Ingestor, EXPANSION_SCORE};
use localrag_memory::{MemoryGraph, MemoryStore};

use support::{fixture, hit, CountingEmbedder};

fn graph() -> MemoryGraph {
    let node = |id: &str| GraphNode { id: id.into(), label: id.into(), metadata: Default::default() };
    let member = |n: &str, p: &str| NodeMembership { node_id: n.into(), passage_id: p.into() };
    MemoryGraph::from_snapshot(GraphSnapshot {
        nodes: vec![node("water"), node("fire"), node("tools")],
        edges: vec![GraphEdge { from: "water".into(), to: "fire".into(), relation: "needs".into() }],
        memberships: vec![
            member("water", "a"),
            member("water", "w2"),
            member("fire", "f1"),
            member("fire", "f2"),
            member("tools", "t1"),
        ],
    })
}

async fn passage_store() -> MemoryStore {
    let store = MemoryStore::new();
    for id in ["a", "b", "w2", "f1", "f2", "t1"] {
        store
            .index(&[Passage { id: id.into(), document_id: format!("doc-{id}"), ordinal: 0, text: format!("text of {id}"), heading: None, embedding: None }])
            .await
            .unwrap();
    }
    store
}

fn base_hits() -> (Vec<localrag_core::types::SearchHit>, Vec<localrag_core::types::SearchHit>) {
    (
        vec![hit("a", 0.9, SourceKind::Vector), hit("b", 0.5, SourceKind::Vector)],
        vec![hit("b", 0.8, SourceKind::Text)],
    )
}

#[tokio::test]
async fn expansion_adds_one_hop_neighbours_with_flat_score() {
    let (v, l) = base_hits();
    let f = fixture(v, l);
    let graph = graph();
    let passages = passage_store().await;
    let out = GraphExpander::new(&f.retriever, &graph, &passages).expand("water", 5, 2).await.unwrap();

    let ids: Vec<&str> = out.iter().map(|c| c.passage_id.as_str()).collect();
    // a fuses to 0.7 and b to 0.3, so the 0.5 extras land between them.
    assert_eq!(ids, ["a", "f1", "f2", "w2", "b"]);
    assert!(out[1..4].iter().all(|c| c.score == EXPANSION_SCORE));
    assert!(!ids.contains(&"t1"));
    assert_eq!(out[1].document_id, "doc-f1");
}

#[tokio::test]
async fn base_set_always_survives_and_size_is_bounded() {
    let (v, l) = base_hits();
    let f = fixture(v, l);
    let graph = graph();
    let passages = passage_store().await;
    let expander = GraphExpander::new(&f.retriever, &graph, &passages);
    for node_limit in 0..6 {
        let base = f.retriever.retrieve("water", node_limit).await.unwrap();
        let out = expander.expand("water", node_limit, 2).await.unwrap();
        assert!(out.len() <= node_limit);
        for b in &base {
            assert!(out.iter().any(|c| c.passage_id == b.passage_id), "lost {}", b.passage_id);
        }
    }
}

#[tokio::test]
async fn hop_chunk_limit_caps_extras() {
    let (v, l) = base_hits();
    let f = fixture(v, l);
    let graph = graph();
    let passages = passage_store().await;
    let out = GraphExpander::new(&f.retriever, &graph, &passages).expand("water", 3, 0).await.unwrap();
    assert_eq!(out.len(), 2);
}

#[tokio::test]
async fn empty_base_skips_traversal() {
    let f = fixture(vec![], vec![]);
    let out = GraphExpander::new(&f.retriever, &FailingGraph, &MemoryStore::new()).expand("water", 5, 2).await.unwrap();
    assert!(out.is_empty());
}

struct FailingGraph;

#[async_trait]
impl GraphStore for FailingGraph {
    async fn nodes_for_passages(&self, _ids: &[PassageId]) -> Result<Vec<NodeId>> {
        Err(anyhow!("graph offline"))
    }

    async fn outgoing_neighbors(&self, _ids: &[NodeId]) -> Result<Vec<NodeId>> {
        Ok(Vec::new())
    }

    async fn passages_for_nodes(&self, _n: &[NodeId], _e: &[PassageId], _l: usize) -> Result<Vec<PassageId>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn graph_failure_surfaces_instead_of_base_only() {
    let (v, l) = base_hits();
    let f = fixture(v, l);
    let err = GraphExpander::new(&f.retriever, &FailingGraph, &MemoryStore::new())
        .expand("water", 5, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Capability { capability: Capability::Graph, .. }));
}

#[tokio::test]
async fn full_base_set_never_consults_the_graph() {
    let (v, l) = base_hits();
    let f = fixture(v, l);
    let out = GraphExpander::new(&f.retriever, &FailingGraph, &MemoryStore::new())
        .expand("water", 2, 2)
        .await
        .unwrap();
    let ids: Vec<&str> = out.iter().map(|c| c.passage_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
}

#[tokio::test]
async fn ingest_embeds_in_batches_and_feeds_every_sink() {
    let embedder = Arc::new(CountingEmbedder::default());
    let a = Arc::new(MemoryStore::new());
    let b = Arc::new(MemoryStore::new());
    let ingestor = Ingestor::new(embedder.clone(), 2).with_sink(a.clone()).with_sink(b.clone());
    let passages: Vec<Passage> = (0..5).map(|i| Passage::new("doc", i, format!("passage {i}"))).collect();

    let mut seen = Vec::new();
    let report = ingestor.ingest(passages, |done| seen.push(done)).await.unwrap();
    assert_eq!(report.passages, 5);
    assert_eq!(report.batches, 3);
    assert_eq!(seen, [2, 4, 5]);
    assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(a.len().await, 5);
    assert_eq!(b.len().await, 5);
    assert_eq!(a.get("doc:4").await.unwrap().embedding, Some(vec![1.0, 0.0]));

    let retriever = HybridRetriever::new(embedder.clone(), a.clone(), a.clone());
    let found = retriever.retrieve("passage 3", 5).await.unwrap();
    assert!(!found.is_empty());
}
