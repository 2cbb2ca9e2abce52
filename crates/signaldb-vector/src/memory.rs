//! Exact in-memory store: every query scans all stored vectors.
use std::cmp::Ordering;

use signaldb_core::error::{Error, Result};
use signaldb_core::traits::{DocumentSource, Embedder, VectorStore};
use signaldb_core::types::{Document, Neighbor, StructuredFilter};

pub struct InMemoryStore {
	entries: Vec<(Document, Vec<f32>)>,
	dim: usize,
}

fn norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

/// `1 - cos(a, b)`; 1.0 when either side has no direction.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let (na, nb) = (norm(a), norm(b));
	if na == 0.0 || nb == 0.0 {
		return 1.0;
	}
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	1.0 - dot / (na * nb)
}

impl InMemoryStore {
	pub fn new(entries: Vec<(Document, Vec<f32>)>) -> Result<Self> {
		let dim = entries.first().map_or(0, |(_, v)| v.len());
		if let Some((doc, v)) = entries.iter().find(|(_, v)| v.len() != dim) {
			return Err(Error::InvalidConfig(format!("'{}' has dimension {}, expected {dim}", doc.id, v.len())));
		}
		Ok(Self { entries, dim })
	}

	/// Embed every document's text with `embedder`.
	pub fn from_documents(documents: Vec<Document>, embedder: &dyn Embedder) -> anyhow::Result<Self> {
		let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
		let vectors = embedder.embed_batch(&texts)?;
		anyhow::ensure!(vectors.len() == documents.len(), "embedder returned {} vectors for {} texts", vectors.len(), documents.len());
		Ok(Self::new(documents.into_iter().zip(vectors).collect())?)
	}

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl DocumentSource for InMemoryStore {
	fn fetch(&self, filter: &StructuredFilter, limit: Option<usize>) -> Result<Vec<Document>> {
		let matching = self.entries.iter().map(|(d, _)| d).filter(|d| filter.matches(&d.metadata));
		Ok(matching.take(limit.unwrap_or(usize::MAX)).cloned().collect())
	}
}

impl VectorStore for InMemoryStore {
	fn nearest(&self, query: &[f32], filter: &StructuredFilter, k: usize) -> Result<Vec<Neighbor>> {
		if !self.entries.is_empty() && query.len() != self.dim {
			return Err(Error::StoreUnavailable(format!("query dimension {} does not match store dimension {}", query.len(), self.dim)));
		}
		let mut scored: Vec<Neighbor> = self
			.entries
			.iter()
			.filter(|(d, _)| filter.matches(&d.metadata))
			.map(|(d, v)| Neighbor { document: d.clone(), distance: cosine_distance(query, v) })
			.collect();
		scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
		scored.truncate(k);
		Ok(scored)
	}

	fn count(&self) -> Result<usize> { Ok(self.entries.len()) }
}
