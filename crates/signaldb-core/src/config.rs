//! Configuration loader, typed engine settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys can be set from the environment with a double underscore,
//! e.g. `APP_ENGINE__RRF_K=30`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::load_from(Path::new("."))?)
    }

    /// Load `config.toml` and the `RUST_ENV` overlay found in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.engine()?;
        Ok(config)
    }

    /// Build from explicit settings, bypassing files and environment.
    pub fn from_settings(engine: &EngineSettings, data: &DataSettings) -> Self {
        let figment = Figment::new()
            .merge(Serialized::default("engine", engine))
            .merge(Serialized::default("data", data));
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// `[engine]` section, defaults when absent.
    pub fn engine(&self) -> Result<EngineSettings> {
        let settings: EngineSettings = self.section("engine")?;
        settings.validate()?;
        Ok(settings)
    }

    /// `[data]` section, defaults when absent.
    pub fn data(&self) -> Result<DataSettings> {
        self.section("data")
    }

    fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if !self.figment.contains(key) {
            return Ok(T::default());
        }
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("[{key}]: {e}")))
    }
}

/// Tunables of the hybrid engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// RRF damping constant.
    pub rrf_k: u32,
    /// Each path is asked for `overfetch_factor * limit` candidates.
    pub overfetch_factor: usize,
    pub default_limit: usize,
    /// Unfiltered sample size for the handle fallback of the lexical builder.
    pub fallback_sample: usize,
    pub lexical_cache_capacity: usize,
    /// Cached lexical indexes older than this are rebuilt. None keeps them
    /// until evicted or invalidated.
    pub lexical_cache_ttl_secs: Option<u64>,
    pub viewpoint_max_chars: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            overfetch_factor: 2,
            default_limit: 5,
            fallback_sample: 100,
            lexical_cache_capacity: 1,
            lexical_cache_ttl_secs: None,
            viewpoint_max_chars: 500,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("rrf_k", self.rrf_k as usize),
            ("overfetch_factor", self.overfetch_factor),
            ("default_limit", self.default_limit),
            ("fallback_sample", self.fallback_sample),
            ("lexical_cache_capacity", self.lexical_cache_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("engine.{name} must be positive")));
            }
        }
        if self.lexical_cache_ttl_secs == Some(0) {
            return Err(Error::InvalidConfig("engine.lexical_cache_ttl_secs must be positive".into()));
        }
        if self.viewpoint_max_chars < 4 {
            return Err(Error::InvalidConfig("engine.viewpoint_max_chars must be at least 4".into()));
        }
        Ok(())
    }

    pub fn lexical_cache_ttl(&self) -> Option<Duration> {
        self.lexical_cache_ttl_secs.map(Duration::from_secs)
    }
}

/// Where the corpus and the vector store live on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory of JSONL files with annotated records.
    pub corpus_dir: String,
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus_dir: "data/corpus".to_string(),
            lancedb_dir: "data/lancedb".to_string(),
            table: "signals".to_string(),
        }
    }
}

impl DataSettings {
    pub fn corpus_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.corpus_dir) }

    pub fn lancedb_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.lancedb_dir) }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
