//! Conversion of raw annotated records into [`Document`]s.
//!
//! Records arrive as JSON objects, one per line, in `.jsonl` files, or as rows
//! of a `.csv` export with a header line. Text fields are concatenated into
//! the searchable payload, scalar fields become metadata, and array/object
//! values are stored as their JSON encoding. CSV cells are all strings, so the
//! boolean and numeric columns are coerced before conversion.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Document, MetaValue, Metadata, MARKET_RELATED_FIELD, SCORE_FIELD};

/// Fields concatenated (in this order) into the document text.
pub const TEXT_FIELDS: [&str; 4] = ["text", "info_overall_assessment", "gpt_explanation", "gpt_reason"];

/// Fields copied into document metadata.
pub const METADATA_FIELDS: [&str; 10] = [
    "id",
    "tweet_id",
    "tweet_url",
    "screen_name",
    "display_name",
    "created_at",
    "gpt_sentiment",
    "gpt_assets",
    "info_final_score",
    "is_market_related",
];

/// Optional precomputed embedding carried by a record.
pub const EMBEDDING_FIELD: &str = "embedding_context";

const TEXT_SEPARATOR: &str = " | ";

/// A converted record plus its precomputed embedding, if it had one.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub document: Document,
    pub embedding: Option<Vec<f32>>,
}

/// Map one JSON value onto the store's scalar model. `null` is dropped.
pub fn meta_value_from_json(value: &Value) -> Option<MetaValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(MetaValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(MetaValue::Number),
        Value::String(s) => Some(MetaValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Some(MetaValue::Text(value.to_string())),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Searchable payload: non-empty text fields joined by `" | "`.
pub fn document_text(obj: &serde_json::Map<String, Value>) -> String {
    let parts: Vec<String> = TEXT_FIELDS
        .iter()
        .filter_map(|f| obj.get(*f).and_then(scalar_text))
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        return obj.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
    }
    parts.join(TEXT_SEPARATOR)
}

/// Accepts either a JSON array of numbers or a string containing one.
fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    let parsed: Value;
    let arr = match value {
        Value::Array(a) => a,
        Value::String(s) if !s.trim().is_empty() => {
            parsed = serde_json::from_str::<Value>(s).ok()?;
            parsed.as_array()?
        }
        _ => return None,
    };
    arr.iter().map(|v| v.as_f64().map(|f| f as f32)).collect()
}

/// Convert one raw record. `line_no` (1-based) names records without an id.
pub fn record_from_json(value: &Value, line_no: usize) -> Result<Record> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Operation(format!("record {line_no} is not a JSON object")))?;

    let text = document_text(obj);
    if text.trim().is_empty() {
        return Err(Error::Operation(format!("record {line_no} has no text")));
    }

    let mut metadata = Metadata::new();
    for field in METADATA_FIELDS {
        if let Some(v) = obj.get(field).and_then(meta_value_from_json) {
            metadata.insert(field.to_string(), v);
        }
    }

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("row_{line_no}"),
    };

    let embedding = obj.get(EMBEDDING_FIELD).and_then(parse_embedding);
    Ok(Record { document: Document { id, text, metadata }, embedding })
}

/// Parse a JSONL file. Malformed or empty records are skipped with a warning.
pub fn load_jsonl(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Operation(format!("read {}: {e}", path.display())))?;
    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() { continue; }
        let parsed = serde_json::from_str::<Value>(line)
            .map_err(|e| Error::Operation(format!("invalid JSON: {e}")))
            .and_then(|v| record_from_json(&v, idx + 1));
        match parsed {
            Ok(r) => out.push(r),
            Err(e) => warn!(file = %path.display(), line = idx + 1, error = %e, "skipping record"),
        }
    }
    debug!(file = %path.display(), records = out.len(), "loaded");
    Ok(out)
}

/// Typed JSON value for one CSV cell. Blank cells are null.
fn csv_cell(field: &str, raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    match field {
        MARKET_RELATED_FIELD => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        SCORE_FIELD => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| Value::String(raw.to_string()), Value::Number),
        _ => Value::String(raw.to_string()),
    }
}

/// Parse a CSV export with a header row. Rows are numbered from 1 for
/// records without an id. Malformed rows are skipped with a warning.
pub fn load_csv(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::Operation(format!("read {}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| Error::Operation(format!("CSV header error in {}: {e}", path.display())))?
        .clone();

    let mut out = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row_no = idx + 1;
        let parsed = row
            .map_err(|e| Error::Operation(format!("CSV row error: {e}")))
            .and_then(|row| {
                let obj: serde_json::Map<String, Value> = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, cell)| (h.to_string(), csv_cell(h, cell)))
                    .collect();
                record_from_json(&Value::Object(obj), row_no)
            });
        match parsed {
            Ok(r) => out.push(r),
            Err(e) => warn!(file = %path.display(), row = row_no, error = %e, "skipping record"),
        }
    }
    debug!(file = %path.display(), records = out.len(), "loaded");
    Ok(out)
}

/// Load every `.jsonl` and `.csv` file under `root` (or `root` itself when it
/// is a file), in path order.
pub fn load_corpus(root: &Path) -> Result<Vec<Record>> {
    let files = list_corpus_files(root);
    if files.is_empty() {
        warn!(dir = %root.display(), "no .jsonl or .csv files found");
        return Ok(vec![]);
    }
    let mut all = Vec::new();
    for file in &files {
        if extension(file) == Some("csv") {
            all.extend(load_csv(file)?);
        } else {
            all.extend(load_jsonl(file)?);
        }
    }
    Ok(all)
}

fn extension(path: &Path) -> Option<&str> { path.extension().and_then(|s| s.to_str()) }

fn list_corpus_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| matches!(extension(p), Some("jsonl" | "csv")))
        .collect();
    files.sort();
    files
}
