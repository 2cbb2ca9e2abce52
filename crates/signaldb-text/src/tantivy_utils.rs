use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

/// Analyzer name for fields whose text is already tokenized and space-joined.
pub const PRETOKENIZED: &str = "pretokenized";

pub const ID_FIELD: &str = "id";
pub const TOKENS_FIELD: &str = "tokens";

/// `id` is stored for lookup, `tokens` carries term frequencies and field
/// norms for BM25 scoring. Positions are not needed.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	let indexing = TextFieldIndexing::default()
		.set_tokenizer(PRETOKENIZED)
		.set_index_option(IndexRecordOption::WithFreqs);
	schema_builder.add_text_field(TOKENS_FIELD, TextOptions::default().set_indexing_options(indexing));
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let analyzer = TextAnalyzer::builder(WhitespaceTokenizer::default()).build();
	index.tokenizers().register(PRETOKENIZED, analyzer);
}
