//! Synchronous LanceDB-backed document source and vector store.
//!
//! The store owns a tokio runtime and blocks on it, so it must not be used
//! from inside another runtime.
use anyhow::{anyhow, Result};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

use signaldb_core::error::Error;
use signaldb_core::traits::{DocumentSource, VectorStore};
use signaldb_core::types::{Document, Neighbor, StructuredFilter};

use crate::table::{batch_to_documents, open_db, predicate_sql};

pub struct LanceStore {
	runtime: Runtime,
	db: Connection,
	table_name: String,
}

fn unavailable(e: &anyhow::Error) -> Error { Error::StoreUnavailable(format!("{e:#}")) }

impl LanceStore {
	pub fn open(db_path: &Path, table_name: &str) -> Result<Self> {
		let runtime = tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build()?;
		let db = runtime.block_on(open_db(db_path.to_string_lossy().as_ref()))?;
		Ok(Self { runtime, db, table_name: table_name.to_string() })
	}

	pub fn table_name(&self) -> &str { &self.table_name }

	async fn table(&self) -> Result<Table> {
		Ok(self.db.open_table(&self.table_name).execute().await?)
	}

	async fn fetch_async(&self, filter: &StructuredFilter, limit: Option<usize>) -> Result<Vec<Document>> {
		let table = self.table().await?;
		// Plain queries default to a small limit; ask for every row explicitly.
		let limit = match limit {
			Some(n) => n,
			None => table.count_rows(None).await?,
		};
		if limit == 0 {
			return Ok(vec![]);
		}
		let mut query = table.query().limit(limit);
		if let Some(pred) = predicate_sql(filter)? {
			query = query.only_if(pred);
		}
		let mut stream = query.execute().await?;
		let mut docs = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			docs.extend(batch_to_documents(&batch)?.into_iter().map(|(d, _)| d));
		}
		Ok(docs)
	}

	async fn nearest_async(&self, query: &[f32], filter: &StructuredFilter, k: usize) -> Result<Vec<Neighbor>> {
		let table = self.table().await?;
		let mut search = table
			.vector_search(query.to_vec())?
			.distance_type(DistanceType::Cosine)
			.bypass_vector_index()
			.limit(k);
		if let Some(pred) = predicate_sql(filter)? {
			search = search.only_if(pred);
		}
		let mut stream = search.execute().await?;
		let mut out = Vec::with_capacity(k);
		while let Some(batch) = stream.try_next().await? {
			for (document, distance) in batch_to_documents(&batch)? {
				let distance = distance.ok_or_else(|| anyhow!("missing distance for '{}'", document.id))?;
				out.push(Neighbor { document, distance });
			}
		}
		out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		out.truncate(k);
		Ok(out)
	}
}

impl DocumentSource for LanceStore {
	fn fetch(&self, filter: &StructuredFilter, limit: Option<usize>) -> signaldb_core::Result<Vec<Document>> {
		let docs = self.runtime.block_on(self.fetch_async(filter, limit)).map_err(|e| unavailable(&e))?;
		debug!(table = %self.table_name, docs = docs.len(), "fetched documents");
		Ok(docs)
	}
}

impl VectorStore for LanceStore {
	fn nearest(&self, query: &[f32], filter: &StructuredFilter, k: usize) -> signaldb_core::Result<Vec<Neighbor>> {
		if k == 0 {
			return Ok(vec![]);
		}
		self.runtime.block_on(self.nearest_async(query, filter, k)).map_err(|e| unavailable(&e))
	}

	fn count(&self) -> signaldb_core::Result<usize> {
		self.runtime
			.block_on(async { Ok::<_, anyhow::Error>(self.table().await?.count_rows(None).await?) })
			.map_err(|e| unavailable(&e))
	}
}
