use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use signaldb_cli::{init_tracing, load_settings, Flags};
use signaldb_text::{tokenize, LexicalCache, LexicalIndexBuilder};
use signaldb_vector::LanceStore;

/// Lexical path only: BM25 over the documents matching the filter.
fn main() -> Result<()> {
    init_tracing("info");
    let flags = Flags::parse(env::args().skip(1))?;
    let req = flags.request();
    if req.query_text.trim().is_empty() {
        eprintln!("Usage: signaldb-search-only <query...> [--trader NAME] [--sentiment LABEL] [--market true|false] [--limit N]");
        std::process::exit(1);
    }
    let settings = load_settings()?;
    let store = Arc::new(LanceStore::open(&settings.data.lancedb_path(Path::new(".")), &settings.data.table)?);
    let builder = LexicalIndexBuilder::new(store, LexicalCache::single_slot()).with_fallback_sample(settings.engine.fallback_sample);

    let filter = req.filter();
    let index = builder.get_or_build(&filter)?;
    let tokens = tokenize(&req.query_text);
    let hits = index.score(&tokens, req.limit.unwrap_or(10))?;

    println!("Query tokens: {tokens:?}");
    println!("Filter: {}  ({} documents indexed)", filter.cache_key(), index.len());
    println!("Found {} results", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let text = index.document(&hit.id).map(|d| d.text.as_str()).unwrap_or_default();
        println!("\n  {}. score={:.4}  id={}", i + 1, hit.score, hit.id);
        println!("     {text}");
    }
    Ok(())
}
