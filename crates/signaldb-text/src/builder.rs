use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use signaldb_core::error::{Error, Result};
use signaldb_core::traits::DocumentSource;
use signaldb_core::types::{DocId, Document, RankedList, StructuredFilter, DISPLAY_NAME_FIELD, HANDLE_FIELD};

use crate::cache::LexicalCache;
use crate::index::Bm25Index;
use crate::tokenize::tokenize;

pub const DEFAULT_FALLBACK_SAMPLE: usize = 100;

/// BM25 model plus the documents it was built from.
pub struct CachedLexicalIndex {
	pub filter: StructuredFilter,
	pub document_ids: Vec<DocId>,
	pub tokenized_docs: Vec<Vec<String>>,
	documents: HashMap<DocId, Document>,
	bm25: Bm25Index,
	pub built_at: Instant,
}

impl CachedLexicalIndex {
	/// Tokenize and index `documents`. Later duplicates of an id are dropped.
	pub fn build(filter: StructuredFilter, documents: Vec<Document>) -> Result<Self> {
		let mut document_ids = Vec::with_capacity(documents.len());
		let mut tokenized_docs = Vec::with_capacity(documents.len());
		let mut by_id = HashMap::with_capacity(documents.len());
		for doc in documents {
			if by_id.contains_key(&doc.id) { continue; }
			document_ids.push(doc.id.clone());
			tokenized_docs.push(tokenize(&doc.text));
			by_id.insert(doc.id.clone(), doc);
		}
		let bm25 = Bm25Index::build(
			document_ids.iter().map(String::as_str).zip(tokenized_docs.iter().map(Vec::as_slice)),
		)
		.map_err(|e| Error::IndexUnavailable(format!("bm25 build failed: {e}")))?;
		Ok(Self { filter, document_ids, tokenized_docs, documents: by_id, bm25, built_at: Instant::now() })
	}

	/// Positive-score matches for `query_tokens`, best first, at most `top_k`.
	pub fn score(&self, query_tokens: &[String], top_k: usize) -> Result<RankedList> {
		self.bm25
			.top_k(query_tokens, top_k)
			.map_err(|e| Error::IndexUnavailable(format!("bm25 search failed: {e}")))
	}

	pub fn document(&self, id: &str) -> Option<&Document> { self.documents.get(id) }

	pub fn len(&self) -> usize { self.document_ids.len() }

	pub fn is_empty(&self) -> bool { self.document_ids.is_empty() }
}

/// Builds lexical indexes on demand and caches them by filter.
pub struct LexicalIndexBuilder {
	source: Arc<dyn DocumentSource>,
	cache: LexicalCache,
	fallback_sample: usize,
}

impl LexicalIndexBuilder {
	pub fn new(source: Arc<dyn DocumentSource>, cache: LexicalCache) -> Self {
		Self { source, cache, fallback_sample: DEFAULT_FALLBACK_SAMPLE }
	}

	#[must_use]
	pub fn with_fallback_sample(mut self, n: usize) -> Self {
		self.fallback_sample = n;
		self
	}

	pub fn cache(&self) -> &LexicalCache { &self.cache }

	/// Index for `filter`, built on a cache miss.
	pub fn get_or_build(&self, filter: &StructuredFilter) -> Result<Arc<CachedLexicalIndex>> {
		let key = filter.cache_key();
		self.cache.get_or_try_insert_with(&key, || {
			let started = Instant::now();
			let documents = self.collect(filter)?;
			let index = CachedLexicalIndex::build(filter.clone(), documents)?;
			info!(key = %key, docs = index.len(), elapsed_ms = started.elapsed().as_millis(), "built lexical index");
			Ok(index)
		})
	}

	fn collect(&self, filter: &StructuredFilter) -> Result<Vec<Document>> {
		let fetched = self.source.fetch(filter, None);
		let handle = filter.get(HANDLE_FIELD).and_then(|v| v.as_str());
		match (fetched, handle) {
			(Ok(docs), _) if !docs.is_empty() => Ok(docs),
			(Ok(_), Some(handle)) => {
				warn!(handle, "no exact handle match, scanning sample");
				self.fuzzy_handle(filter, handle)
			}
			(Err(e), Some(handle)) => {
				warn!(handle, error = %e, "filtered fetch failed, scanning sample");
				self.fuzzy_handle(filter, handle)
			}
			(Ok(_), None) => Err(Error::IndexUnavailable(format!("no documents match {}", filter.cache_key()))),
			(Err(e), None) => Err(e),
		}
	}

	/// Case-insensitive substring match of `handle` against the identity
	/// fields of an unfiltered sample. Other predicates still apply exactly.
	fn fuzzy_handle(&self, filter: &StructuredFilter, handle: &str) -> Result<Vec<Document>> {
		let needle = handle.to_lowercase();
		let rest = filter.without(HANDLE_FIELD);
		let sample = self.source.fetch(&StructuredFilter::new(), Some(self.fallback_sample))?;
		let kept: Vec<Document> = sample
			.into_iter()
			.filter(|d| {
				[HANDLE_FIELD, DISPLAY_NAME_FIELD]
					.iter()
					.filter_map(|f| d.meta_str(f))
					.any(|v| v.to_lowercase().contains(&needle))
			})
			.filter(|d| rest.matches(&d.metadata))
			.collect();
		if kept.is_empty() {
			return Err(Error::IndexUnavailable(format!("no documents for handle '{handle}'")));
		}
		Ok(kept)
	}
}
