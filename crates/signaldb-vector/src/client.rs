use std::sync::Arc;
use tracing::{debug, warn};

use signaldb_core::error::Result;
use signaldb_core::traits::VectorStore;
use signaldb_core::types::{Document, RankedList, SearchHit, SourceKind, StructuredFilter};

/// Hits plus the documents behind them.
#[derive(Debug, Clone, Default)]
pub struct VectorSearchOutcome {
	pub hits: RankedList,
	pub documents: Vec<Document>,
	/// False when the store rejected the filter and the search ran unfiltered.
	pub filter_applied: bool,
}

/// Distance to similarity; higher is closer.
pub fn similarity(distance: f32) -> f32 { 1.0 / (1.0 + distance) }

pub struct VectorSearchClient {
	store: Arc<dyn VectorStore>,
}

impl VectorSearchClient {
	pub fn new(store: Arc<dyn VectorStore>) -> Self { Self { store } }

	pub fn store(&self) -> &Arc<dyn VectorStore> { &self.store }

	/// Nearest `k` documents to `query_vector` under `filter`.
	///
	/// A filtered query that fails is retried once without the filter, so
	/// callers must re-check the filter themselves when `filter_applied` is
	/// false.
	pub fn search(&self, query_vector: &[f32], filter: &StructuredFilter, k: usize) -> Result<VectorSearchOutcome> {
		let (neighbors, filter_applied) = match self.store.nearest(query_vector, filter, k) {
			Ok(n) => (n, true),
			Err(e) if !filter.is_empty() => {
				warn!(error = %e, filter = %filter.cache_key(), "filtered vector search failed, retrying unfiltered");
				(self.store.nearest(query_vector, &StructuredFilter::new(), k)?, false)
			}
			Err(e) => return Err(e),
		};
		debug!(hits = neighbors.len(), filter_applied, "vector search");
		let hits = neighbors
			.iter()
			.map(|n| SearchHit { id: n.document.id.clone(), score: similarity(n.distance), source: SourceKind::Vector })
			.collect();
		let documents = neighbors.into_iter().map(|n| n.document).collect();
		Ok(VectorSearchOutcome { hits, documents, filter_applied })
	}
}
