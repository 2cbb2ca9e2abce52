//! Post-filter on the JSON-encoded asset list, which the store cannot query.

use serde_json::Value;

use signaldb_core::types::{AssetFilter, Document, MetaValue, ASSET_FIELD};

fn element_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.to_uppercase(),
        other => other.to_string().to_uppercase(),
    }
}

/// Whether `doc` is tagged with at least one of `wanted` (upper-cased).
fn carries_any(doc: &Document, wanted: &std::collections::BTreeSet<String>) -> bool {
    let raw = match doc.metadata.get(ASSET_FIELD) {
        None => return false,
        Some(MetaValue::Text(s)) => s.as_str(),
        // a scalar is never a list of tickers
        Some(_) => return false,
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items.iter().map(element_text).any(|t| wanted.contains(&t)),
        Ok(_) => false,
        Err(_) => {
            let upper = raw.to_uppercase();
            wanted.iter().any(|t| upper.contains(t.as_str()))
        }
    }
}

/// Keep documents whose asset list intersects the request, preserving order.
pub fn filter_by_asset(results: Vec<Document>, assets: &AssetFilter) -> Vec<Document> {
    match assets {
        AssetFilter::Disabled => results,
        AssetFilter::Any(wanted) => results.into_iter().filter(|d| carries_any(d, wanted)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, assets: Option<&str>) -> Document {
        let d = Document::new(id, "post");
        match assets {
            Some(a) => d.with_meta(ASSET_FIELD, a),
            None => d,
        }
    }

    fn ids(docs: &[Document]) -> Vec<&str> { docs.iter().map(|d| d.id.as_str()).collect() }

    #[test]
    fn or_semantics_across_tickers() {
        let docs = vec![doc("1", Some(r#"["btc"]"#)), doc("2", Some(r#"["ETH","SOL"]"#)), doc("3", Some(r#"["DOGE"]"#))];
        let out = filter_by_asset(docs, &AssetFilter::any(["btc", "Sol"]));
        assert_eq!(ids(&out), vec!["1", "2"]);
    }

    #[test]
    fn disabled_and_blur_keep_everything() {
        let docs = vec![doc("1", None), doc("2", Some("[]"))];
        assert_eq!(filter_by_asset(docs.clone(), &AssetFilter::Disabled).len(), 2);
        assert_eq!(filter_by_asset(docs, &AssetFilter::any(["BLUR", "BTC"])).len(), 2);
    }

    #[test]
    fn missing_non_array_and_malformed_fields() {
        let docs = vec![
            doc("missing", None),
            doc("object", Some(r#"{"BTC": true}"#)),
            doc("number", Some("42")),
            doc("broken", Some("BTC, eth")),
            doc("nums", Some("[42]")),
        ];
        let out = filter_by_asset(docs, &AssetFilter::any(["eth", "42"]));
        assert_eq!(ids(&out), vec!["broken", "nums"]);
    }
}
