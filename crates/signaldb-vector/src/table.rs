//! LanceDB connection helpers plus the row codec shared by reads.
//!
//! Structured filters are rendered to SQL predicates only for fields that have
//! their own typed column; anything else cannot be pushed down.
use anyhow::{anyhow, Result};
use arrow_array::{Array, BooleanArray, Float32Array, Float64Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{connect, Connection};

use signaldb_core::types::{Document, MetaValue, Metadata, StructuredFilter};

use crate::schema::{
	build_arrow_schema, meta_column, MetaColumn, BOOL_META_COLUMNS, DISTANCE_COLUMN, EXTRA_COLUMN, ID_COLUMN,
	NUMBER_META_COLUMNS, TEXT_COLUMN, TEXT_META_COLUMNS,
};

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Create an empty table with the document schema unless it already exists.
pub async fn ensure_table(conn: &Connection, name: &str, dim: i32) -> Result<()> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	let schema = build_arrow_schema(dim);
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
	conn.create_table(name, Box::new(iter)).execute().await?;
	Ok(())
}

fn quote(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

/// SQL `WHERE` clause for `filter`, or None for the empty filter. Fails when
/// a predicate has no typed column or its value type does not match.
pub fn predicate_sql(filter: &StructuredFilter) -> Result<Option<String>> {
	if filter.is_empty() {
		return Ok(None);
	}
	let mut clauses = Vec::with_capacity(filter.len());
	for (field, value) in filter.predicates() {
		let clause = match (meta_column(field), value) {
			(Some(MetaColumn::Text), MetaValue::Text(s)) => format!("{field} = {}", quote(s)),
			(Some(MetaColumn::Bool), MetaValue::Bool(b)) => format!("{field} = {b}"),
			(Some(MetaColumn::Number), MetaValue::Number(n)) if n.is_finite() => format!("{field} = {n}"),
			_ => return Err(anyhow!("predicate on '{field}' cannot be pushed down")),
		};
		clauses.push(clause);
	}
	Ok(Some(clauses.join(" AND ")))
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

/// Decode rows into documents, with the `_distance` column when present.
pub fn batch_to_documents(batch: &RecordBatch) -> Result<Vec<(Document, Option<f32>)>> {
	let ids = string_col(batch, ID_COLUMN).ok_or_else(|| anyhow!("{ID_COLUMN} column missing"))?;
	let texts = string_col(batch, TEXT_COLUMN).ok_or_else(|| anyhow!("{TEXT_COLUMN} column missing"))?;
	let extra = string_col(batch, EXTRA_COLUMN);
	let distances = batch.column_by_name(DISTANCE_COLUMN).and_then(|c| c.as_any().downcast_ref::<Float32Array>());

	let text_cols: Vec<(&str, &StringArray)> =
		TEXT_META_COLUMNS.iter().filter_map(|c| string_col(batch, c).map(|a| (*c, a))).collect();
	let bool_cols: Vec<(&str, &BooleanArray)> = BOOL_META_COLUMNS
		.iter()
		.filter_map(|c| batch.column_by_name(c).and_then(|a| a.as_any().downcast_ref::<BooleanArray>()).map(|a| (*c, a)))
		.collect();
	let num_cols: Vec<(&str, &Float64Array)> = NUMBER_META_COLUMNS
		.iter()
		.filter_map(|c| batch.column_by_name(c).and_then(|a| a.as_any().downcast_ref::<Float64Array>()).map(|a| (*c, a)))
		.collect();

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let mut metadata = Metadata::new();
		if let Some(extra) = extra.filter(|a| a.is_valid(i)) {
			let parsed: Metadata = serde_json::from_str(extra.value(i))?;
			metadata.extend(parsed);
		}
		for (name, arr) in &text_cols {
			if arr.is_valid(i) { metadata.insert((*name).to_string(), MetaValue::Text(arr.value(i).to_string())); }
		}
		for (name, arr) in &bool_cols {
			if arr.is_valid(i) { metadata.insert((*name).to_string(), MetaValue::Bool(arr.value(i))); }
		}
		for (name, arr) in &num_cols {
			if arr.is_valid(i) { metadata.insert((*name).to_string(), MetaValue::Number(arr.value(i))); }
		}
		let document = Document { id: ids.value(i).to_string(), text: texts.value(i).to_string(), metadata };
		let distance = distances.filter(|d| d.is_valid(i)).map(|d| d.value(i));
		out.push((document, distance));
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_typed_predicates() {
		let f = StructuredFilter::handle("O'Brien").market_related(true);
		assert_eq!(
			predicate_sql(&f).expect("sql").as_deref(),
			Some("is_market_related = true AND screen_name = 'O''Brien'")
		);
		assert_eq!(predicate_sql(&StructuredFilter::new()).expect("sql"), None);
	}

	#[test]
	fn rejects_untyped_or_mismatched_predicates() {
		let unknown = StructuredFilter::new().with("lang", "en").expect("filter");
		assert!(predicate_sql(&unknown).is_err());
		let mismatched = StructuredFilter::new().with("is_market_related", "yes").expect("filter");
		assert!(predicate_sql(&mismatched).is_err());
	}
}
