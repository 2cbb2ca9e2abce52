//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::{Error, Result};

pub type DocId = String;
pub type Metadata = HashMap<String, MetaValue>;

/// Handle of the account that authored the post.
pub const HANDLE_FIELD: &str = "screen_name";
/// Human readable account name, second identity field.
pub const DISPLAY_NAME_FIELD: &str = "display_name";
pub const SENTIMENT_FIELD: &str = "gpt_sentiment";
pub const MARKET_RELATED_FIELD: &str = "is_market_related";
pub const SCORE_FIELD: &str = "info_final_score";
/// JSON-encoded list of tickers. Never part of a [`StructuredFilter`].
pub const ASSET_FIELD: &str = "gpt_assets";

/// Request value that turns asset post-filtering off.
pub const ASSET_FILTER_DISABLED: &str = "blur";

/// Scalar metadata value as accepted by the store.
///
/// Arrays and objects never reach this type directly; the ingestion boundary
/// encodes them as JSON text (see `record::meta_value_from_json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self { Self::Text(value.to_string()) }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self { Self::Text(value) }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self { Self::Number(value) }
}

/// An annotated post as stored in the corpus.
///
/// - `id`: store identifier
/// - `text`: the searchable payload (post text plus its annotations)
/// - `metadata`: scalar attributes, plus the JSON-encoded asset list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Metadata::new() }
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetaValue::as_str)
    }
}

/// Conjunction of scalar equality predicates over document metadata.
///
/// Predicates live in an ordered map, so two filters compare equal exactly
/// when their predicate sets do. [`StructuredFilter::cache_key`] is the
/// canonical form used to key the lexical cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredFilter {
    predicates: BTreeMap<String, MetaValue>,
}

impl StructuredFilter {
    pub fn new() -> Self { Self::default() }

    /// Add `field = value`. The asset list cannot be matched by equality and
    /// is rejected here; it is handled by the asset post-filter instead.
    pub fn with(mut self, field: &str, value: impl Into<MetaValue>) -> Result<Self> {
        if field == ASSET_FIELD {
            return Err(Error::InvalidFilter(format!("'{ASSET_FIELD}' must be filtered with an asset filter")));
        }
        if field.is_empty() {
            return Err(Error::InvalidFilter("empty field name".to_string()));
        }
        self.predicates.insert(field.to_string(), value.into());
        Ok(self)
    }

    pub fn handle(name: &str) -> Self {
        Self::default().with_unchecked(HANDLE_FIELD, name.into())
    }

    #[must_use]
    pub fn sentiment(self, label: &str) -> Self {
        self.with_unchecked(SENTIMENT_FIELD, label.into())
    }

    #[must_use]
    pub fn market_related(self, flag: bool) -> Self {
        self.with_unchecked(MARKET_RELATED_FIELD, flag.into())
    }

    fn with_unchecked(mut self, field: &str, value: MetaValue) -> Self {
        self.predicates.insert(field.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool { self.predicates.is_empty() }

    pub fn len(&self) -> usize { self.predicates.len() }

    pub fn get(&self, field: &str) -> Option<&MetaValue> { self.predicates.get(field) }

    pub fn predicates(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Same filter minus one field.
    #[must_use]
    pub fn without(&self, field: &str) -> Self {
        let mut predicates = self.predicates.clone();
        predicates.remove(field);
        Self { predicates }
    }

    /// Evaluate the conjunction against a metadata map. A missing field fails
    /// its predicate.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.predicates.iter().all(|(field, expected)| metadata.get(field) == Some(expected))
    }

    /// Canonical key; `"all"` for the empty filter.
    pub fn cache_key(&self) -> String {
        if self.predicates.is_empty() {
            return "all".to_string();
        }
        self.predicates
            .iter()
            .map(|(k, v)| match v {
                MetaValue::Text(s) => format!("{k}={s:?}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Which tickers a caller wants to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssetFilter {
    /// Keep every result.
    #[default]
    Disabled,
    /// Keep results tagged with at least one of these (upper-cased) tickers.
    Any(BTreeSet<String>),
}

impl AssetFilter {
    pub fn any<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut wanted = BTreeSet::new();
        for t in tickers {
            let t = t.as_ref().trim();
            if t.is_empty() { continue; }
            if t.eq_ignore_ascii_case(ASSET_FILTER_DISABLED) { return Self::Disabled; }
            wanted.insert(t.to_uppercase());
        }
        if wanted.is_empty() { Self::Disabled } else { Self::Any(wanted) }
    }

    /// Build from the request's interchangeable `asset` / `assets` fields.
    /// `assets` wins when both are given; the disable sentinel in either
    /// field turns filtering off.
    pub fn from_request(asset: Option<&str>, assets: Option<&[String]>) -> Self {
        if asset.is_some_and(|a| a.trim().eq_ignore_ascii_case(ASSET_FILTER_DISABLED)) {
            return Self::Disabled;
        }
        match assets {
            Some(list) if list.iter().any(|a| !a.trim().is_empty()) => Self::any(list),
            _ => asset.map_or(Self::Disabled, |a| Self::any([a])),
        }
    }

    pub fn is_disabled(&self) -> bool { matches!(self, Self::Disabled) }
}

/// Indicates which retrieval path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Vector,
    Text,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector => f.write_str("vector"),
            Self::Text => f.write_str("lexical"),
        }
    }
}

/// One entry of a ranked list.
///
/// `score` is path-specific and only comparable within the same `source`.
/// Higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocId,
    pub score: f32,
    pub source: SourceKind,
}

/// Best-first hits from a single retrieval path.
pub type RankedList = Vec<SearchHit>;

/// A nearest-neighbor match as returned by a vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub document: Document,
    pub distance: f32,
}
