use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use signaldb_cli::{embed_records, init_tracing, load_settings};
use signaldb_core::record::load_corpus;
use signaldb_embed::get_default_embedder;
use signaldb_vector::LanceWriter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");
    let settings = load_settings()?;
    let base = Path::new(".");
    let corpus_dir = env::args().nth(1).map_or_else(|| settings.data.corpus_path(base), PathBuf::from);
    let db_path = settings.data.lancedb_path(base);

    info!(corpus = %corpus_dir.display(), db = %db_path.display(), table = %settings.data.table, "indexing");
    let records = load_corpus(&corpus_dir)?;
    if records.is_empty() {
        println!("No records found under {}", corpus_dir.display());
        return Ok(());
    }

    // model inference is blocking; keep it off the async workers
    let (docs, embeddings) = tokio::task::spawn_blocking(move || {
        let embedder = get_default_embedder()?;
        embed_records(records, embedder.as_ref())
    })
    .await??;

    let dim = i32::try_from(embeddings.first().map_or(0, Vec::len))?;
    let writer = LanceWriter::new(&db_path, &settings.data.table, dim).await?;
    let written = writer.write(&docs, &embeddings).await?;

    println!("Indexed {written} documents into {}/{}", db_path.display(), settings.data.table);
    println!("Search with: cargo run --bin signaldb -- query '<text>'");
    Ok(())
}
