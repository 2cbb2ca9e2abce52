use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, ReloadPolicy, TantivyDocument, Term};

use signaldb_core::types::{RankedList, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, ID_FIELD, TOKENS_FIELD};
use crate::tokenize::tokenize_join;

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// BM25 (Okapi) model over a fixed set of pre-tokenized documents, held in RAM.
pub struct Bm25Index {
	reader: IndexReader,
	id_field: Field,
	tokens_field: Field,
	num_docs: usize,
}

impl Bm25Index {
	/// Index `(id, tokens)` pairs. Tokens must come from [`crate::tokenize`].
	pub fn build<'a, I>(docs: I) -> Result<Self>
	where
		I: IntoIterator<Item = (&'a str, &'a [String])>,
	{
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field(ID_FIELD)?;
		let tokens_field = schema.get_field(TOKENS_FIELD)?;

		let mut writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
		let mut num_docs = 0;
		for (id, tokens) in docs {
			writer.add_document(doc!(
				id_field => id.to_string(),
				tokens_field => tokenize_join(tokens),
			))?;
			num_docs += 1;
		}
		writer.commit()?;

		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { reader, id_field, tokens_field, num_docs })
	}

	pub fn len(&self) -> usize { self.num_docs }

	pub fn is_empty(&self) -> bool { self.num_docs == 0 }

	/// Best `k` documents sharing at least one query token, highest score first.
	pub fn top_k(&self, query_tokens: &[String], k: usize) -> Result<RankedList> {
		if k == 0 || query_tokens.is_empty() || self.num_docs == 0 {
			return Ok(vec![]);
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = query_tokens
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.tokens_field, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			if score <= 0.0 { continue; }
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(self.id_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(SearchHit { id, score, source: SourceKind::Text });
		}
		Ok(hits)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tokenize::tokenize;

	fn build(docs: &[(&str, &str)]) -> Bm25Index {
		let tokenized: Vec<(String, Vec<String>)> = docs.iter().map(|(id, t)| (id.to_string(), tokenize(t))).collect();
		Bm25Index::build(tokenized.iter().map(|(id, toks)| (id.as_str(), toks.as_slice()))).expect("build")
	}

	#[test]
	fn ranks_higher_term_frequency_first() {
		let idx = build(&[("a", "rates rates rates cut"), ("b", "rates and liquidity"), ("c", "nothing related")]);
		let hits = idx.top_k(&tokenize("rates"), 10).expect("search");
		let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
		assert_eq!(ids, vec!["a", "b"]);
		assert!(hits.iter().all(|h| h.score > 0.0 && h.source == SourceKind::Text));
	}

	#[test]
	fn zero_k_and_empty_queries_return_nothing() {
		let idx = build(&[("a", "fed")]);
		assert!(idx.top_k(&tokenize("fed"), 0).expect("search").is_empty());
		assert!(idx.top_k(&[], 5).expect("search").is_empty());
		assert!(idx.top_k(&tokenize("unknown"), 5).expect("search").is_empty());
	}

	#[test]
	fn empty_corpus_is_searchable() {
		let idx = Bm25Index::build(std::iter::empty()).expect("build");
		assert!(idx.is_empty());
		assert!(idx.top_k(&tokenize("fed"), 3).expect("search").is_empty());
	}
}
