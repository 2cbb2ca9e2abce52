//! Request and response shapes of the query surface.

use serde::{Deserialize, Serialize};

use signaldb_core::types::{AssetFilter, Document, StructuredFilter};

fn non_blank(s: Option<&String>) -> Option<&str> {
    s.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Free-text query with optional attribute constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub query_text: String,
    pub trader_name: Option<String>,
    pub sentiment: Option<String>,
    pub is_market_related: Option<bool>,
    pub asset: Option<String>,
    pub assets: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl QueryRequest {
    pub fn filter(&self) -> StructuredFilter {
        build_filter(non_blank(self.trader_name.as_ref()), non_blank(self.sentiment.as_ref()), self.is_market_related)
    }

    pub fn asset_filter(&self) -> AssetFilter {
        AssetFilter::from_request(self.asset.as_deref(), self.assets.as_deref())
    }
}

/// Everything a trader said, optionally narrowed further.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryByNameRequest {
    pub trader_name: String,
    pub sentiment: Option<String>,
    pub is_market_related: Option<bool>,
    pub asset: Option<String>,
    pub assets: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl QueryByNameRequest {
    pub fn filter(&self) -> StructuredFilter {
        let name = self.trader_name.trim();
        build_filter(Some(name).filter(|n| !n.is_empty()), non_blank(self.sentiment.as_ref()), self.is_market_related)
    }

    pub fn asset_filter(&self) -> AssetFilter {
        AssetFilter::from_request(self.asset.as_deref(), self.assets.as_deref())
    }
}

fn build_filter(handle: Option<&str>, sentiment: Option<&str>, market: Option<bool>) -> StructuredFilter {
    let mut filter = handle.map_or_else(StructuredFilter::new, StructuredFilter::handle);
    if let Some(s) = sentiment {
        filter = filter.sentiment(s);
    }
    if let Some(m) = market {
        filter = filter.market_related(m);
    }
    filter
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub trader_name: String,
    pub results: Vec<Document>,
    pub viewpoints: Vec<String>,
    /// Empty when retrieval was complete.
    pub error_reason: String,
}

impl QueryResponse {
    pub fn rejected(trader_name: &str, reason: impl Into<String>) -> Self {
        Self { trader_name: trader_name.to_string(), error_reason: reason.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `ok`, or `error` when the store cannot be read.
    pub status: String,
    pub documents: Option<usize>,
    pub embedder: String,
    /// Store table (collection) the engine reads from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Embedding model, once loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// At most `max_chars` characters; longer text is cut to `max_chars - 3`
/// characters followed by `...`.
pub fn truncate_viewpoint(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewpoints_are_cut_on_char_boundaries() {
        assert_eq!(truncate_viewpoint("short", 500), "short");
        let long = "a".repeat(501);
        let cut = truncate_viewpoint(&long, 500);
        assert_eq!(cut.chars().count(), 500);
        assert!(cut.ends_with("..."));
        let cjk = "比".repeat(10);
        assert_eq!(truncate_viewpoint(&cjk, 5), "比比...");
        assert_eq!(truncate_viewpoint(&"x".repeat(500), 500).len(), 500);
    }

    #[test]
    fn blank_fields_do_not_become_predicates() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"query_text": "fed", "trader_name": "  ", "sentiment": "bullish", "is_market_related": true}"#,
        )
        .expect("parse");
        assert_eq!(req.filter(), StructuredFilter::new().sentiment("bullish").market_related(true));
        assert_eq!(req.limit, None);
        assert!(req.asset_filter().is_disabled());
    }

    #[test]
    fn by_name_request_filters_on_handle() {
        let req: QueryByNameRequest =
            serde_json::from_str(r#"{"trader_name": " Pentosh1 ", "assets": ["sol"]}"#).expect("parse");
        assert_eq!(req.filter(), StructuredFilter::handle("Pentosh1"));
        assert!(!req.asset_filter().is_disabled());
    }
}
