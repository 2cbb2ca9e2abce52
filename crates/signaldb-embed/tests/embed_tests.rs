use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use signaldb_core::traits::Embedder;
use signaldb_core::Error;
use signaldb_embed::{get_default_embedder, validate_embeddings, FakeEmbedder, LazyEmbedder, BGE_M3_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading large model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder().expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs[0].len(), BGE_M3_DIM, "embedding dim is 1024");

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in embs[0].iter().zip(embs[1].iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_embedder_shared_words_are_closer() {
    let e = FakeEmbedder::new(256);
    let v = e
        .embed_batch(&["Fed rate cut".to_string(), "fed RATE cut soon".to_string(), "ETH breakout".to_string()])
        .expect("embed");
    assert!(cosine(&v[0], &v[1]) > cosine(&v[0], &v[2]));
    let empty = e.embed_batch(&[String::new()]).expect("embed");
    assert!(empty[0].iter().all(|x| x.is_finite()));
}

#[test]
fn validation_rejects_malformed_output() {
    assert!(validate_embeddings(&[vec![0.0; 4]], 1, 4).is_ok());
    assert!(matches!(validate_embeddings(&[], 1, 4), Err(Error::Embedding(_))));
    assert!(matches!(validate_embeddings(&[vec![0.0; 3]], 1, 4), Err(Error::Embedding(_))));
    assert!(matches!(validate_embeddings(&[vec![f32::NAN; 4]], 1, 4), Err(Error::Embedding(_))));
}

#[test]
fn lazy_embedder_loads_once_and_retries_failures() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let lazy = LazyEmbedder::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("weights missing");
        }
        Ok(Box::new(FakeEmbedder::new(8)) as Box<dyn Embedder>)
    });

    assert!(matches!(lazy.embed_query("fed"), Err(Error::Embedding(_))));
    assert!(!lazy.is_loaded());
    assert_eq!(lazy.embed_query("fed").expect("second try loads").len(), 8);
    lazy.embed_query("liquidity").expect("cached");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_first_queries_load_model_once() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let lazy = LazyEmbedder::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        Ok(Box::new(FakeEmbedder::new(8)) as Box<dyn Embedder>)
    });

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lazy = &lazy;
                s.spawn(move || lazy.embed_query(&format!("fed cut {i}")).expect("embed"))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().expect("thread").len(), 8);
        }
    });
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(lazy.is_loaded());
    assert_eq!(lazy.model_name().as_deref(), Some("fake-hash-8"));
}
