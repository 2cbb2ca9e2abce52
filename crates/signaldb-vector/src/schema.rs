use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use signaldb_core::types::{ASSET_FIELD, DISPLAY_NAME_FIELD, HANDLE_FIELD, MARKET_RELATED_FIELD, SCORE_FIELD, SENTIMENT_FIELD};

pub const ID_COLUMN: &str = "id";
pub const TEXT_COLUMN: &str = "text";
pub const VECTOR_COLUMN: &str = "vector";
/// JSON object with every metadata entry that has no typed column.
pub const EXTRA_COLUMN: &str = "extra_json";
pub const DISTANCE_COLUMN: &str = "_distance";

/// Metadata fields stored as nullable Utf8 columns.
pub const TEXT_META_COLUMNS: [&str; 7] =
	[HANDLE_FIELD, DISPLAY_NAME_FIELD, SENTIMENT_FIELD, ASSET_FIELD, "tweet_url", "tweet_id", "created_at"];
pub const BOOL_META_COLUMNS: [&str; 1] = [MARKET_RELATED_FIELD];
pub const NUMBER_META_COLUMNS: [&str; 1] = [SCORE_FIELD];

/// Column type a metadata field is stored under, if it has its own column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaColumn {
	Text,
	Bool,
	Number,
}

pub fn meta_column(field: &str) -> Option<MetaColumn> {
	if TEXT_META_COLUMNS.contains(&field) {
		Some(MetaColumn::Text)
	} else if BOOL_META_COLUMNS.contains(&field) {
		Some(MetaColumn::Bool)
	} else if NUMBER_META_COLUMNS.contains(&field) {
		Some(MetaColumn::Number)
	} else {
		None
	}
}

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	let mut fields = vec![
		Field::new(ID_COLUMN, DataType::Utf8, false),
		Field::new(TEXT_COLUMN, DataType::Utf8, false),
	];
	fields.extend(TEXT_META_COLUMNS.iter().map(|c| Field::new(*c, DataType::Utf8, true)));
	fields.extend(BOOL_META_COLUMNS.iter().map(|c| Field::new(*c, DataType::Boolean, true)));
	fields.extend(NUMBER_META_COLUMNS.iter().map(|c| Field::new(*c, DataType::Float64, true)));
	fields.push(Field::new(EXTRA_COLUMN, DataType::Utf8, true));
	fields.push(Field::new(
		VECTOR_COLUMN,
		DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
		true,
	));
	Arc::new(Schema::new(fields))
}
