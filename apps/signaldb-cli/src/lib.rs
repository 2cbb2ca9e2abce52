//! Shared plumbing for the signaldb binaries: logging setup, config loading,
//! flag parsing and corpus embedding.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use signaldb_core::config::{Config, DataSettings, EngineSettings};
use signaldb_core::record::{load_corpus, Record};
use signaldb_core::traits::Embedder;
use signaldb_core::types::Document;
use signaldb_embed::LazyEmbedder;
use signaldb_hybrid::request::{QueryByNameRequest, QueryRequest};
use signaldb_hybrid::HybridSearchEngine;
use signaldb_vector::{InMemoryStore, LanceStore};

/// Log to stderr; `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub struct Settings {
    pub engine: EngineSettings,
    pub data: DataSettings,
}

pub fn load_settings() -> Result<Settings> {
    let config = Config::load().context("loading config")?;
    Ok(Settings { engine: config.engine()?, data: config.data()? })
}

/// Flags shared by the query binaries.
#[derive(Debug, Default, PartialEq)]
pub struct Flags {
    pub positional: Vec<String>,
    pub trader: Option<String>,
    pub sentiment: Option<String>,
    pub market: Option<bool>,
    pub assets: Vec<String>,
    pub limit: Option<usize>,
    pub memory: bool,
    pub json: bool,
}

impl Flags {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut flags = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| args.next().with_context(|| format!("{name} requires a value"));
            match arg.as_str() {
                "--trader" | "-t" => flags.trader = Some(value("--trader")?),
                "--sentiment" => flags.sentiment = Some(value("--sentiment")?),
                "--market" => {
                    let v = value("--market")?;
                    flags.market = Some(v.parse().with_context(|| format!("--market expects true or false, got '{v}'"))?);
                }
                "--asset" | "-a" => flags.assets.push(value("--asset")?),
                "--limit" | "-n" => {
                    let v = value("--limit")?;
                    flags.limit = Some(v.parse().with_context(|| format!("--limit expects a number, got '{v}'"))?);
                }
                "--memory" => flags.memory = true,
                "--json" => flags.json = true,
                other if other.starts_with('-') => bail!("unknown flag '{other}'"),
                other => flags.positional.push(other.to_string()),
            }
        }
        Ok(flags)
    }

    /// Free-text request from the positional words.
    pub fn request(&self) -> QueryRequest {
        QueryRequest {
            query_text: self.positional.join(" "),
            trader_name: self.trader.clone(),
            sentiment: self.sentiment.clone(),
            is_market_related: self.market,
            asset: None,
            assets: (!self.assets.is_empty()).then(|| self.assets.clone()),
            limit: self.limit,
        }
    }

    /// By-name request; the trader is `--trader` or the first positional word.
    pub fn by_name_request(&self) -> Result<QueryByNameRequest> {
        let trader_name = self
            .trader
            .clone()
            .or_else(|| self.positional.first().cloned())
            .context("a trader name is required")?;
        Ok(QueryByNameRequest {
            trader_name,
            sentiment: self.sentiment.clone(),
            is_market_related: self.market,
            asset: None,
            assets: (!self.assets.is_empty()).then(|| self.assets.clone()),
            limit: self.limit,
        })
    }
}

/// Pair every record with a vector: its precomputed embedding when the
/// dimension matches, a fresh one from `embedder` otherwise.
pub fn embed_records(records: Vec<Record>, embedder: &dyn Embedder) -> Result<(Vec<Document>, Vec<Vec<f32>>)> {
    let dim = embedder.dim();
    let missing: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.embedding.as_ref().map_or(true, |e| e.len() != dim))
        .map(|(i, _)| i)
        .collect();
    let texts: Vec<String> = missing.iter().map(|&i| records[i].document.text.clone()).collect();
    let fresh = if texts.is_empty() { vec![] } else { embedder.embed_batch(&texts)? };
    if fresh.len() != texts.len() {
        bail!("embedder returned {} vectors for {} texts", fresh.len(), texts.len());
    }
    if records.len() > missing.len() {
        info!(reused = records.len() - missing.len(), "using precomputed embeddings");
    }

    let mut fresh = fresh.into_iter();
    let mut next_missing = missing.into_iter().peekable();
    let mut docs = Vec::with_capacity(records.len());
    let mut vectors = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        let vector = if next_missing.peek() == Some(&i) {
            next_missing.next();
            fresh.next().context("embedding batch exhausted")?
        } else {
            record.embedding.context("precomputed embedding vanished")?
        };
        docs.push(record.document);
        vectors.push(vector);
    }
    Ok((docs, vectors))
}

/// Corpus loaded from JSONL and embedded into an exact in-memory store.
pub fn memory_store(corpus_dir: &Path, embedder: &dyn Embedder) -> Result<InMemoryStore> {
    let records = load_corpus(corpus_dir)?;
    if records.is_empty() {
        warn!(dir = %corpus_dir.display(), "corpus is empty");
    }
    let (docs, vectors) = embed_records(records, embedder)?;
    Ok(InMemoryStore::new(docs.into_iter().zip(vectors).collect())?)
}

/// Engine over LanceDB, or over the JSONL/CSV corpus in memory when `memory` is set.
pub fn build_engine(settings: &Settings, memory: bool) -> Result<HybridSearchEngine> {
    let base = Path::new(".");
    if memory {
        let embedder: Arc<dyn Embedder> = Arc::from(signaldb_embed::get_default_embedder()?);
        let store = Arc::new(memory_store(&settings.data.corpus_path(base), embedder.as_ref())?);
        return Ok(HybridSearchEngine::with_store(store, LazyEmbedder::ready(embedder), settings.engine.clone()));
    }
    let store = Arc::new(LanceStore::open(&settings.data.lancedb_path(base), &settings.data.table)?);
    Ok(HybridSearchEngine::with_store(store, LazyEmbedder::from_env(), settings.engine.clone()).with_table(&settings.data.table))
}
