//! Bulk ingestion of embedded documents into a LanceDB table.
use anyhow::{ensure, Result};
use arrow_array::{BooleanArray, FixedSizeListArray, Float64Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use signaldb_core::types::{Document, MetaValue, Metadata};

use crate::schema::{build_arrow_schema, meta_column, MetaColumn, BOOL_META_COLUMNS, NUMBER_META_COLUMNS, TEXT_META_COLUMNS};
use crate::table::{ensure_table, open_db};

const BATCH_SIZE: usize = 1000;

pub struct LanceWriter {
	db: Connection,
	table_name: String,
	dim: i32,
}

impl LanceWriter {
	pub async fn new(db_path: &Path, table_name: &str, dim: i32) -> Result<Self> {
		let db = open_db(db_path.to_string_lossy().as_ref()).await?;
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	/// Append documents with their embeddings, creating the table on first write.
	pub async fn write(&self, docs: &[Document], embeddings: &[Vec<f32>]) -> Result<usize> {
		ensure!(docs.len() == embeddings.len(), "{} documents but {} embeddings", docs.len(), embeddings.len());
		if docs.is_empty() {
			info!("no documents to write");
			return Ok(0);
		}
		let dim = usize::try_from(self.dim)?;
		if let Some(bad) = embeddings.iter().position(|e| e.len() != dim) {
			anyhow::bail!("embedding for '{}' has dimension {}, expected {dim}", docs[bad].id, embeddings[bad].len());
		}

		ensure_table(&self.db, &self.table_name, self.dim).await?;

		let pb = ProgressBar::new(docs.len() as u64);
		pb.set_style(
			ProgressStyle::default_bar()
				.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} docs ({percent}%) {msg}")?
				.progress_chars("#>-"),
		);
		for (chunk_docs, chunk_embs) in docs.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE)) {
			self.insert_batch(to_record_batch(chunk_docs, chunk_embs, self.dim)?).await?;
			pb.inc(chunk_docs.len() as u64);
		}
		pb.finish_with_message("done");
		info!(table = %self.table_name, docs = docs.len(), "wrote documents");
		Ok(docs.len())
	}

	async fn insert_batch(&self, batch: RecordBatch) -> Result<()> {
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		Ok(())
	}
}

/// Metadata entries without a matching typed column, as a JSON object.
fn extra_json(metadata: &Metadata) -> Result<Option<String>> {
	let extra: Metadata = metadata
		.iter()
		.filter(|(k, v)| {
			!matches!(
				(meta_column(k), v),
				(Some(MetaColumn::Text), MetaValue::Text(_))
					| (Some(MetaColumn::Bool), MetaValue::Bool(_))
					| (Some(MetaColumn::Number), MetaValue::Number(_))
			)
		})
		.map(|(k, v)| (k.clone(), v.clone()))
		.collect();
	if extra.is_empty() { Ok(None) } else { Ok(Some(serde_json::to_string(&extra)?)) }
}

pub fn to_record_batch(docs: &[Document], embeddings: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	let mut columns: Vec<Arc<dyn arrow_array::Array>> = vec![
		Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.id.as_str()))),
		Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.text.as_str()))),
	];
	for c in TEXT_META_COLUMNS {
		columns.push(Arc::new(docs.iter().map(|d| d.metadata.get(c).and_then(MetaValue::as_str)).collect::<StringArray>()));
	}
	for c in BOOL_META_COLUMNS {
		columns.push(Arc::new(docs.iter().map(|d| d.metadata.get(c).and_then(MetaValue::as_bool)).collect::<BooleanArray>()));
	}
	for c in NUMBER_META_COLUMNS {
		columns.push(Arc::new(docs.iter().map(|d| d.metadata.get(c).and_then(MetaValue::as_f64)).collect::<Float64Array>()));
	}
	let extras = docs.iter().map(|d| extra_json(&d.metadata)).collect::<Result<Vec<_>>>()?;
	columns.push(Arc::new(StringArray::from(extras)));
	let vectors = embeddings.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));
	columns.push(Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)));
	Ok(RecordBatch::try_new(build_arrow_schema(dim), columns)?)
}
