//! Hybrid lexical + semantic retrieval.
//!
//! [`HybridSearchEngine`] runs the BM25 path and the vector path for a query,
//! fuses both rankings with RRF, applies the asset post-filter and truncates.
//! A failing path contributes nothing and is reported in
//! [`SearchOutcome::degraded`]; only an empty query is rejected outright.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use signaldb_core::config::EngineSettings;
use signaldb_core::error::{Error, Result};
use signaldb_core::traits::{DocumentSource, VectorStore};
use signaldb_core::types::{AssetFilter, Document, RankedList, SourceKind, StructuredFilter};
use signaldb_embed::LazyEmbedder;
use signaldb_text::{tokenize, CachedLexicalIndex, LexicalCache, LexicalIndexBuilder};
use signaldb_vector::VectorSearchClient;

pub mod asset_filter;
pub mod fusion;
pub mod request;

pub use asset_filter::filter_by_asset;
pub use fusion::{fuse, reciprocal_rank_fusion, RRF_K};
pub use request::{truncate_viewpoint, HealthReport, QueryByNameRequest, QueryRequest, QueryResponse};

/// A retrieval path that failed for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub path: SourceKind,
    pub reason: String,
}

impl Degradation {
    /// Expected outages log at warn; anything else hints at a bug.
    fn logged(path: SourceKind, e: &Error) -> Self {
        if e.is_degradation() {
            warn!(%path, error = %e, "search path degraded");
        } else {
            error!(%path, error = %e, "search path failed");
        }
        Self { path, reason: e.to_string() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub documents: Vec<Document>,
    pub degraded: Vec<Degradation>,
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool { self.degraded.is_empty() }

    /// Empty when both paths contributed, otherwise names the failed paths.
    pub fn diagnostic(&self) -> String {
        if self.degraded.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self.degraded.iter().map(|d| format!("{} search unavailable: {}", d.path, d.reason)).collect();
        parts.join("; ")
    }
}

pub struct HybridSearchEngine {
    lexical: LexicalIndexBuilder,
    vector: VectorSearchClient,
    embedder: LazyEmbedder,
    settings: EngineSettings,
    table: Option<String>,
}

impl HybridSearchEngine {
    pub fn new(lexical: LexicalIndexBuilder, vector: VectorSearchClient, embedder: LazyEmbedder, settings: EngineSettings) -> Self {
        Self { lexical, vector, embedder, settings, table: None }
    }

    /// Name of the store table, reported by [`HybridSearchEngine::health`].
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// One store serving both the lexical rebuilds and the vector queries.
    pub fn with_store<S>(store: Arc<S>, embedder: LazyEmbedder, settings: EngineSettings) -> Self
    where
        S: DocumentSource + VectorStore + 'static,
    {
        let capacity = NonZeroUsize::new(settings.lexical_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let cache = LexicalCache::new(capacity, settings.lexical_cache_ttl());
        let source: Arc<dyn DocumentSource> = store.clone();
        let lexical = LexicalIndexBuilder::new(source, cache).with_fallback_sample(settings.fallback_sample);
        let vector = VectorSearchClient::new(store);
        Self::new(lexical, vector, embedder, settings)
    }

    pub fn settings(&self) -> &EngineSettings { &self.settings }

    pub fn lexical(&self) -> &LexicalIndexBuilder { &self.lexical }

    /// Ranked documents for `text` under `filter`, at most `limit` of them.
    #[instrument(skip(self, filter, assets), fields(filter = %filter.cache_key()))]
    pub fn query(&self, text: &str, filter: &StructuredFilter, assets: &AssetFilter, limit: usize) -> Result<SearchOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyQuery);
        }
        if limit == 0 {
            return Ok(SearchOutcome::default());
        }
        let started = Instant::now();
        let fetch_k = limit.saturating_mul(self.settings.overfetch_factor);
        let tokens = tokenize(text);
        let mut degraded = Vec::new();

        let (lexical_hits, lexical_index) = match self.lexical_path(&tokens, filter, fetch_k) {
            Ok((hits, index)) => (hits, Some(index)),
            Err(e) => {
                degraded.push(Degradation::logged(SourceKind::Text, &e));
                (vec![], None)
            }
        };
        let (vector_hits, vector_docs) = match self.vector_path(text, filter, fetch_k) {
            Ok(found) => found,
            Err(e) => {
                degraded.push(Degradation::logged(SourceKind::Vector, &e));
                (vec![], HashMap::new())
            }
        };
        debug!(lexical = lexical_hits.len(), vector = vector_hits.len(), "candidates");

        let fused = fuse(&vector_hits, &lexical_hits, self.settings.rrf_k);
        let resolved: Vec<Document> = fused
            .iter()
            .filter_map(|id| {
                lexical_index
                    .as_ref()
                    .and_then(|idx| idx.document(id))
                    .or_else(|| vector_docs.get(id.as_str()))
                    .cloned()
            })
            .collect();
        let mut documents = filter_by_asset(resolved, assets);
        documents.truncate(limit);

        info!(
            results = documents.len(),
            degraded = degraded.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "hybrid query"
        );
        Ok(SearchOutcome { documents, degraded })
    }

    /// Posts by `handle`, using the handle as the query text as well.
    pub fn query_by_trader(&self, handle: &str, assets: &AssetFilter, limit: usize) -> Result<SearchOutcome> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(Error::EmptyTraderName);
        }
        self.query(handle, &StructuredFilter::handle(handle), assets, limit)
    }

    fn lexical_path(&self, tokens: &[String], filter: &StructuredFilter, k: usize) -> Result<(RankedList, Arc<CachedLexicalIndex>)> {
        let index = self.lexical.get_or_build(filter)?;
        let hits = index.score(tokens, k)?;
        Ok((hits, index))
    }

    fn vector_path(&self, text: &str, filter: &StructuredFilter, k: usize) -> Result<(RankedList, HashMap<String, Document>)> {
        let query_vector = self.embedder.embed_query(text)?;
        let outcome = self.vector.search(&query_vector, filter, k)?;
        let mut hits = Vec::with_capacity(outcome.hits.len());
        let mut docs = HashMap::with_capacity(outcome.documents.len());
        // the store may have ignored the filter; never trust it
        for (hit, doc) in outcome.hits.into_iter().zip(outcome.documents) {
            if filter.matches(&doc.metadata) {
                hits.push(hit);
                docs.entry(doc.id.clone()).or_insert(doc);
            }
        }
        Ok((hits, docs))
    }

    /// Answer a [`QueryRequest`]; never fails.
    pub fn respond(&self, req: &QueryRequest) -> QueryResponse {
        let trader = req.trader_name.as_deref().map(str::trim).unwrap_or_default();
        let limit = req.limit.unwrap_or(self.settings.default_limit);
        let outcome = self.query(&req.query_text, &req.filter(), &req.asset_filter(), limit);
        self.shape(trader, outcome)
    }

    /// Answer a [`QueryByNameRequest`]; never fails.
    pub fn respond_by_name(&self, req: &QueryByNameRequest) -> QueryResponse {
        let trader = req.trader_name.trim();
        if trader.is_empty() {
            return QueryResponse::rejected("", Error::EmptyTraderName.to_string());
        }
        let limit = req.limit.unwrap_or(self.settings.default_limit);
        let outcome = self.query(trader, &req.filter(), &req.asset_filter(), limit);
        self.shape(trader, outcome)
    }

    fn shape(&self, trader: &str, outcome: Result<SearchOutcome>) -> QueryResponse {
        match outcome {
            Ok(outcome) => {
                let viewpoints = outcome
                    .documents
                    .iter()
                    .filter(|d| !d.text.is_empty())
                    .map(|d| truncate_viewpoint(&d.text, self.settings.viewpoint_max_chars))
                    .collect();
                QueryResponse {
                    trader_name: trader.to_string(),
                    error_reason: outcome.diagnostic(),
                    viewpoints,
                    results: outcome.documents,
                }
            }
            Err(e) => QueryResponse::rejected(trader, e.to_string()),
        }
    }

    pub fn health(&self) -> HealthReport {
        let model = self.embedder.model_name();
        let embedder = if model.is_some() { "loaded" } else { "not loaded" }.to_string();
        let table = self.table.clone();
        match self.vector.store().count() {
            Ok(n) => HealthReport { status: "ok".into(), documents: Some(n), embedder, table, model, error: None },
            Err(e) => HealthReport { status: "error".into(), documents: None, embedder, table, model, error: Some(e.to_string()) },
        }
    }
}
