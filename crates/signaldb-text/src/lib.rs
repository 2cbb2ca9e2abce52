//! signaldb-text
//!
//! Lexical side of the engine: tokenizer, an in-RAM tantivy BM25 index and
//! the filter-keyed cache of indexes built from the document source.
pub mod builder;
pub mod cache;
pub mod index;
pub mod tantivy_utils;
pub mod tokenize;

pub use builder::{CachedLexicalIndex, LexicalIndexBuilder};
pub use cache::LexicalCache;
pub use index::Bm25Index;
pub use tokenize::{tokenize, tokenize_join};
