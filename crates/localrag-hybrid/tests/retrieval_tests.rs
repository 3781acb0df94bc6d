mod support;

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use localrag_core::config::TimeoutSettings;
use localrag_core::error::{Capability, Error, ErrorKind};
use localrag_core::progress::{PipelineEvent, Stage};
use localrag_core::types::{FusionWeights, SourceKind};
use localrag_hybrid::{fuse, min_max_normalize, HybridRetriever};

use support::{fixture, hit, CountingEmbedder, FailingSearch, FixedSearch};

#[tokio::test]
async fn two_signal_scenario_ranks_a_then_b() {
    let f = fixture(
        vec![hit("a", 0.9, SourceKind::Vector), hit("b", 0.5, SourceKind::Vector)],
        vec![hit("b", 0.8, SourceKind::Text), hit("c", 0.2, SourceKind::Text)],
    );
    let out = f.retriever.retrieve("water purification", 2).await.unwrap();
    let ids: Vec<&str> = out.iter().map(|c| c.passage_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    // a: 0.7 * 1.0 + 0.3 * 0.0; b: 0.7 * 5/9 + 0.3 * 1.0
    assert!((out[0].score - 0.7).abs() < 1e-5);
    assert!((out[1].score - (0.7 * 5.0 / 9.0 + 0.3)).abs() < 1e-5);
    assert_eq!(out[1].snippet, "text of b");

    let all = f.retriever.retrieve("water purification", 3).await.unwrap();
    assert_eq!(all[2].passage_id, "c");
    assert!((all[2].score - 0.075).abs() < 1e-5);
}

#[tokio::test]
async fn one_embedding_and_widened_candidate_limit() {
    let f = fixture(vec![hit("a", 0.9, SourceKind::Vector)], vec![]);
    f.retriever.retrieve("query", 3).await.unwrap();
    assert_eq!(f.embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.vector.last_limit.load(Ordering::SeqCst), 12);
    assert_eq!(f.lexical.last_limit.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn blank_query_touches_nothing() {
    let f = fixture(vec![hit("a", 0.9, SourceKind::Vector)], vec![hit("a", 0.9, SourceKind::Text)]);
    assert!(f.retriever.retrieve("", 5).await.unwrap().is_empty());
    assert!(f.retriever.retrieve("   ", 5).await.unwrap().is_empty());
    assert!(f.retriever.retrieve("query", 0).await.unwrap().is_empty());
    assert_eq!(f.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.vector.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.lexical.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn both_signals_empty_is_empty() {
    let f = fixture(vec![], vec![]);
    assert!(f.retriever.retrieve("anything", 4).await.unwrap().is_empty());
}

#[tokio::test]
async fn store_failure_is_tagged_with_capability() {
    let retriever = HybridRetriever::new(
        Arc::new(CountingEmbedder::default()),
        Arc::new(FixedSearch::new(vec![hit("a", 0.9, SourceKind::Vector)])),
        Arc::new(FailingSearch),
    );
    let err = retriever.retrieve("query", 2).await.unwrap_err();
    assert!(matches!(err, Error::Capability { capability: Capability::LexicalSearch, .. }));
    assert_eq!(err.kind(), ErrorKind::Capability);
}

struct SlowSearch;

#[async_trait::async_trait]
impl localrag_core::traits::VectorSearch for SlowSearch {
    async fn search_vector(&self, _e: &[f32], _l: usize) -> anyhow::Result<Vec<localrag_core::types::SearchHit>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn slow_store_times_out() {
    let timeouts = TimeoutSettings { search_ms: 50, ..TimeoutSettings::default() };
    let retriever = HybridRetriever::new(
        Arc::new(CountingEmbedder::default()),
        Arc::new(SlowSearch),
        Arc::new(FixedSearch::new(vec![])),
    )
    .with_timeouts(timeouts);
    let err = retriever.retrieve("query", 2).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { capability: Capability::VectorSearch, .. }));
}

#[tokio::test]
async fn progress_reports_embedder_then_retriever() {
    let f = fixture(vec![hit("a", 0.9, SourceKind::Vector)], vec![]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    f.retriever.retrieve_with_progress("query", 1, &tx).await.unwrap();
    drop(tx);
    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }
    assert_eq!(events, [PipelineEvent::Stage(Stage::Embedder), PipelineEvent::Stage(Stage::Retriever)]);
}

fn hits(scores: &BTreeMap<u8, f32>, source: SourceKind) -> Vec<localrag_core::types::SearchHit> {
    scores.iter().map(|(id, s)| hit(&format!("p{id}"), *s, source)).collect()
}

proptest! {
    #[test]
    fn normalized_values_stay_in_unit_range(values in prop::collection::vec(-1000.0f32..1000.0, 0..32)) {
        let out = min_max_normalize(&values);
        prop_assert_eq!(out.len(), values.len());
        prop_assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn constant_input_normalizes_to_half(value in -10.0f32..10.0, n in 1usize..16) {
        prop_assert!(min_max_normalize(&vec![value; n]).iter().all(|v| *v == 0.5));
    }

    #[test]
    fn fused_output_is_sorted_and_bounded(
        vector in prop::collection::btree_map(0u8..12, 0.0f32..1.0, 0..8),
        lexical in prop::collection::btree_map(0u8..12, 0.0f32..1.0, 0..8),
        top_k in 0usize..10,
    ) {
        let out = fuse(&hits(&vector, SourceKind::Vector), &hits(&lexical, SourceKind::Text), FusionWeights::default(), top_k);
        prop_assert!(out.len() <= top_k);
        prop_assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    }

    /// The candidate holding the top vector score is never overtaken when the
    /// semantic weight grows.
    #[test]
    fn raising_semantic_weight_never_demotes_the_vector_leader(
        vector in prop::collection::btree_map(0u8..8, 0.0f32..1.0, 1..6),
        lexical in prop::collection::btree_map(0u8..8, 0.0f32..1.0, 0..6),
        semantic in 0.0f32..1.0,
        raise in 0.0f32..1.0,
        lexical_weight in 0.0f32..1.0,
    ) {
        let vh = hits(&vector, SourceKind::Vector);
        let lh = hits(&lexical, SourceKind::Text);
        let universe: Vec<u8> = vector.keys().chain(lexical.keys()).copied().collect();
        let raw = |id: u8| vector.get(&id).copied().unwrap_or(0.0);
        let leader = universe.iter().copied().fold(universe[0], |best, id| if raw(id) > raw(best) { id } else { best });
        let leader = format!("p{leader}");

        let n = universe.len();
        let low = fuse(&vh, &lh, FusionWeights { semantic, lexical: lexical_weight }, n);
        let high = fuse(&vh, &lh, FusionWeights { semantic: semantic + raise, lexical: lexical_weight }, n);
        let score = |out: &[localrag_core::types::RankedCandidate], id: &str| {
            out.iter().find(|c| c.passage_id == id).map(|c| c.score).unwrap_or(f32::NAN)
        };
        let leader_low = score(&low, &leader);
        let leader_high = score(&high, &leader);
        for c in &high {
            if c.score > leader_high + 1e-4 {
                prop_assert!(score(&low, &c.passage_id) > leader_low, "{} overtook {}", c.passage_id, leader);
            }
        }
    }
}
