use crate::error::Result;
use crate::types::{Document, Neighbor, StructuredFilter};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
    /// Identifier reported by health checks.
    fn model_name(&self) -> String { "unknown".to_string() }
}

/// Bulk read access to the corpus, used to (re)build the lexical index.
pub trait DocumentSource: Send + Sync {
    /// Documents matching `filter`; at most `limit` of them when given.
    fn fetch(&self, filter: &StructuredFilter, limit: Option<usize>) -> Result<Vec<Document>>;
}

/// Filtered exact nearest-neighbor search over stored embeddings.
pub trait VectorStore: Send + Sync {
    /// Up to `k` neighbors of `query`, nearest first. Cosine distance.
    fn nearest(&self, query: &[f32], filter: &StructuredFilter, k: usize) -> Result<Vec<Neighbor>>;
    fn count(&self) -> Result<usize>;
}
