use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{info, warn};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use signaldb_core::error::Error;
use signaldb_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

/// Output dimension of BGE-M3.
pub const BGE_M3_DIM: usize = 1024;
pub const BGE_M3_NAME: &str = "BAAI/bge-m3";
const DEFAULT_MAX_LEN: usize = 256;

/// BGE-M3 (XLM-RoBERTa) sentence embedder running on candle.
pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl EmbeddingModel {
    pub fn new() -> Result<Self> { Self::from_dir(&resolve_model_dir()?) }

    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let started = Instant::now();
        let device = select_device();
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(dir = %model_dir.display(), elapsed_ms = started.elapsed().as_millis(), "loaded BGE-M3");
        Ok(Self { model, tokenizer, device, max_len: DEFAULT_MAX_LEN })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { BGE_M3_DIM }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
    fn model_name(&self) -> String { BGE_M3_NAME.to_string() }
}

/// Deterministic hashing embedder for tests and offline runs.
///
/// Lower-cased whitespace tokens are hashed into buckets, so texts sharing
/// words land close to each other. Output is L2-normalized.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            #[allow(clippy::cast_possible_truncation)]
            let idx = (h % self.dim as u64) as usize;
            #[allow(clippy::cast_precision_loss)]
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[0] = 1.0;
        } else {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { DEFAULT_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
    fn model_name(&self) -> String { format!("fake-hash-{}", self.dim) }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn get_default_embedder() -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        info!("using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(BGE_M3_DIM)));
    }
    Ok(Box::new(EmbeddingModel::new()?))
}

fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { return Ok(p); }
            warn!(var, dir = %p.display(), "model dir does not exist");
        }
    }
    ["../models/bge-m3", "models/bge-m3"]
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Could not locate BGE-M3 model directory"))
}

/// Reject malformed model output: wrong count, wrong dimension or
/// non-finite components.
pub fn validate_embeddings(vectors: &[Vec<f32>], expected: usize, dim: usize) -> signaldb_core::Result<()> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!("expected {expected} vectors, got {}", vectors.len())));
    }
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != dim {
            return Err(Error::Embedding(format!("vector {i} has dimension {}, expected {dim}", v.len())));
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(Error::Embedding(format!("vector {i} has non-finite values")));
        }
    }
    Ok(())
}

type Loader = Box<dyn Fn() -> Result<Box<dyn Embedder>> + Send + Sync>;

/// Embedder loaded on first use.
///
/// Loading happens under the lock, so concurrent first callers load once.
/// A failed load leaves the slot empty and the next call tries again.
pub struct LazyEmbedder {
    slot: Mutex<Option<Arc<dyn Embedder>>>,
    loader: Loader,
}

impl LazyEmbedder {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Embedder>> + Send + Sync + 'static,
    {
        Self { slot: Mutex::new(None), loader: Box::new(loader) }
    }

    /// Uses [`get_default_embedder`] on first call.
    pub fn from_env() -> Self { Self::new(get_default_embedder) }

    /// Already-loaded embedder.
    pub fn ready(embedder: Arc<dyn Embedder>) -> Self {
        Self { slot: Mutex::new(Some(embedder)), loader: Box::new(|| Err(anyhow!("embedder already loaded"))) }
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Name of the loaded model; never triggers a load.
    pub fn model_name(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|e| e.model_name())
    }

    pub fn get(&self) -> signaldb_core::Result<Arc<dyn Embedder>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = slot.as_ref() {
            return Ok(Arc::clone(e));
        }
        let loaded: Arc<dyn Embedder> = Arc::from((self.loader)().map_err(|e| Error::Embedding(format!("model load failed: {e}")))?);
        *slot = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Embed a single query, validating the model output.
    pub fn embed_query(&self, text: &str) -> signaldb_core::Result<Vec<f32>> {
        let embedder = self.get()?;
        let mut out = embedder
            .embed_batch(&[text.to_string()])
            .map_err(|e| Error::Embedding(e.to_string()))?;
        validate_embeddings(&out, 1, embedder.dim())?;
        out.pop().ok_or_else(|| Error::Embedding("empty embedding batch".into()))
    }
}
