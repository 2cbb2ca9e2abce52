use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use signaldb_core::error::{Error, Result};
use signaldb_core::traits::{DocumentSource, VectorStore};
use signaldb_core::types::{Document, Neighbor, SourceKind, StructuredFilter};
use signaldb_vector::client::similarity;
use signaldb_vector::{InMemoryStore, VectorSearchClient};

fn store() -> InMemoryStore {
    InMemoryStore::new(vec![
        (Document::new("a", "alpha").with_meta("screen_name", "alice"), vec![1.0, 0.0]),
        (Document::new("b", "beta").with_meta("screen_name", "bob"), vec![0.7, 0.7]),
        (Document::new("c", "gamma").with_meta("screen_name", "alice"), vec![0.0, 1.0]),
    ])
    .expect("store")
}

#[test]
fn exact_search_orders_by_cosine_distance() {
    let s = store();
    let near = s.nearest(&[1.0, 0.1], &StructuredFilter::new(), 3).expect("nearest");
    let ids: Vec<_> = near.iter().map(|n| n.document.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let alice = s.nearest(&[0.0, 1.0], &StructuredFilter::handle("alice"), 5).expect("nearest");
    assert_eq!(alice.iter().map(|n| n.document.id.as_str()).collect::<Vec<_>>(), vec!["c", "a"]);
    assert!(s.nearest(&[1.0, 0.0, 0.0], &StructuredFilter::new(), 1).is_err());
}

#[test]
fn fetch_applies_filter_and_limit() {
    let s = store();
    assert_eq!(s.fetch(&StructuredFilter::handle("alice"), None).expect("fetch").len(), 2);
    assert_eq!(s.fetch(&StructuredFilter::new(), Some(1)).expect("fetch").len(), 1);
    assert_eq!(s.count().expect("count"), 3);
}

#[test]
fn mismatched_dimensions_rejected() {
    let bad = InMemoryStore::new(vec![
        (Document::new("a", "x"), vec![1.0, 0.0]),
        (Document::new("b", "y"), vec![1.0]),
    ]);
    assert!(bad.is_err());
}

/// Rejects every filtered query.
struct NoFilterStore {
    inner: InMemoryStore,
    calls: AtomicUsize,
}

impl VectorStore for NoFilterStore {
    fn nearest(&self, query: &[f32], filter: &StructuredFilter, k: usize) -> Result<Vec<Neighbor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !filter.is_empty() {
            return Err(Error::StoreUnavailable("where clause rejected".into()));
        }
        self.inner.nearest(query, filter, k)
    }
    fn count(&self) -> Result<usize> { self.inner.count() }
}

#[test]
fn client_retries_unfiltered_once() {
    let backing = Arc::new(NoFilterStore { inner: store(), calls: AtomicUsize::new(0) });
    let client = VectorSearchClient::new(backing.clone());
    let outcome = client.search(&[1.0, 0.0], &StructuredFilter::handle("bob"), 2).expect("degraded search");
    assert!(!outcome.filter_applied);
    assert_eq!(backing.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.hits.len(), 2);
    assert_eq!(outcome.documents.len(), 2);
    assert!(outcome.hits.iter().all(|h| h.source == SourceKind::Vector));
    assert!((outcome.hits[0].score - 1.0).abs() < 1e-6, "identical vector scores 1");
}

#[test]
fn client_surfaces_unfiltered_failures() {
    struct Down;
    impl VectorStore for Down {
        fn nearest(&self, _: &[f32], _: &StructuredFilter, _: usize) -> Result<Vec<Neighbor>> {
            Err(Error::StoreUnavailable("offline".into()))
        }
        fn count(&self) -> Result<usize> { Err(Error::StoreUnavailable("offline".into())) }
    }
    let client = VectorSearchClient::new(Arc::new(Down));
    assert!(client.search(&[1.0], &StructuredFilter::new(), 3).is_err());
    assert!(client.search(&[1.0], &StructuredFilter::handle("x"), 3).is_err());
}

#[test]
fn similarity_is_monotone_in_distance() {
    assert!((similarity(0.0) - 1.0).abs() < f32::EPSILON);
    assert!((similarity(1.0) - 0.5).abs() < f32::EPSILON);
    assert!(similarity(0.2) > similarity(0.3));
}
