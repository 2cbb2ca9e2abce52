use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use signaldb_cli::{init_tracing, load_settings, Flags};
use signaldb_embed::LazyEmbedder;
use signaldb_vector::{LanceStore, VectorSearchClient};

/// Vector path only: nearest neighbors of the embedded query.
fn main() -> Result<()> {
    init_tracing("info");
    let flags = Flags::parse(env::args().skip(1))?;
    let req = flags.request();
    if req.query_text.trim().is_empty() {
        eprintln!("Usage: signaldb-vector-search <query...> [--trader NAME] [--sentiment LABEL] [--market true|false] [--limit N]");
        std::process::exit(1);
    }
    let settings = load_settings()?;
    let store = Arc::new(LanceStore::open(&settings.data.lancedb_path(Path::new(".")), &settings.data.table)?);
    let client = VectorSearchClient::new(store);
    let embedder = LazyEmbedder::from_env();

    let query_vector = embedder.embed_query(&req.query_text)?;
    let outcome = client.search(&query_vector, &req.filter(), req.limit.unwrap_or(10))?;

    if !outcome.filter_applied {
        println!("Filter could not be applied; results are unfiltered");
    }
    println!("Found {} results", outcome.hits.len());
    for (i, (hit, doc)) in outcome.hits.iter().zip(&outcome.documents).enumerate() {
        println!("\n  {}. score={:.4}  id={}", i + 1, hit.score, hit.id);
        println!("     {}", doc.text);
    }
    Ok(())
}
