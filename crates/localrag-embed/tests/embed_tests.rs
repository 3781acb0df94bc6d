use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};

use localrag_core::config::EmbedderSettings;
use localrag_core::traits::Embedder;
use localrag_embed::{local_embedder, masked_mean_l2, CachedEmbedder, HashEmbedder};

#[test]
fn masked_mean_l2_basic() {
    let dev = Device::Cpu;
    // Two tokens with hidden dim 4; second token is masked out.
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1i64, 0i64], (1, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
    let out = masked_mean_l2(&h, &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let norm: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    let expected = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in v[0].iter().copied().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={a} b={b}");
    }
}

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(64);
    let texts = vec!["hello world".to_string(), "Hello World".to_string(), String::new()];
    let embs = embedder.embed(&texts).await.expect("embed");
    assert_eq!(embs.len(), 3);
    assert_eq!(embs[0].len(), 64);

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // case-insensitive and deterministic
    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
    assert!(embs[2].iter().all(|x| *x == 0.0));
    assert!(embedder.embed(&[]).await.expect("empty").is_empty());
}

#[test]
fn hash_embedder_overlap_yields_higher_similarity() {
    let e = HashEmbedder::new(256);
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let q = e.embed_text("boil water filter");
    let near = e.embed_text("boil water before drinking");
    let far = e.embed_text("sharpen the axe");
    assert!(dot(&q, &near) > dot(&q, &far));
}

struct CountingEmbedder {
    calls: AtomicUsize,
    inner: HashEmbedder,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(texts).await
    }
}

#[tokio::test]
async fn cache_serves_only_exact_matches() {
    let inner = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0), inner: HashEmbedder::new(32) });
    let cached = CachedEmbedder::new(inner.clone(), 8);

    let a1 = cached.embed(&["fire starting".to_string()]).await.unwrap();
    let a2 = cached.embed(&["fire starting".to_string()]).await.unwrap();
    assert_eq!(a1, a2);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

    // A different string (even only by case/whitespace) is a miss.
    let b = cached.embed(&["fire  starting".to_string()]).await.unwrap();
    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    assert_eq!(b[0], HashEmbedder::new(32).embed_text("fire  starting"));
    assert_eq!(cached.len(), 2);

    // Mixed batch only computes the missing entry and keeps input order.
    let mixed = cached.embed(&["new text".to_string(), "fire starting".to_string()]).await.unwrap();
    assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    assert_eq!(mixed[1], a1[0]);
    assert_eq!(mixed[0], HashEmbedder::new(32).embed_text("new text"));
}

#[tokio::test]
async fn cache_is_bounded_by_capacity() {
    let cached = CachedEmbedder::new(Arc::new(HashEmbedder::new(8)), 1);
    for text in ["one", "two", "three", "four"] {
        cached.embed(&[text.to_string()]).await.unwrap();
    }
    assert!(cached.len() <= 1, "len={}", cached.len());
}

#[tokio::test]
async fn repeated_query_is_admitted_once_cache_is_full() {
    let inner = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0), inner: HashEmbedder::new(16) });
    let cached = CachedEmbedder::new(inner.clone(), 2);
    cached.embed(&["old1".to_string()]).await.unwrap();
    cached.embed(&["old2".to_string()]).await.unwrap();
    assert_eq!(cached.len(), 2);

    let hot = vec!["hot query".to_string()];
    for _ in 0..8 {
        cached.embed(&hot).await.unwrap();
        // Settles pending admissions.
        let _ = cached.len();
    }
    let settled = inner.calls.load(Ordering::SeqCst);
    // Frequency-based admission may cost a few misses, never one per call.
    assert!(settled < 2 + 8, "calls={settled}");
    for _ in 0..4 {
        cached.embed(&hot).await.unwrap();
    }
    assert_eq!(inner.calls.load(Ordering::SeqCst), settled);
    assert!(cached.len() <= 2);
}

#[tokio::test]
async fn fake_embeddings_env_selects_hash_embedder() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let settings = EmbedderSettings { dim: 16, ..EmbedderSettings::default() };
    let embedder = local_embedder(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 16);
    let v = embedder.embed(&["hello".to_string()]).await.unwrap();
    assert_eq!(v[0].len(), 16);
}
