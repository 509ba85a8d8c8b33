//! Parsing of the search payload emitted by documentation generators.
//!
//! Accepted shapes: a JSON array of records, an object with a `docs` array,
//! a single record object, the same wrapped in a script assignment
//! (`var documenterSearchIndex = {"docs": [...]}`), and JSON Lines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, SearchError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub location: String,
    /// Grouping key: the page this record belongs to.
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: String,
}

impl FeedRecord {
    pub fn new(location: impl Into<String>, title: impl Into<String>, text: impl Into<String>, category: impl Into<String>) -> Self {
        let title = title.into();
        Self { location: location.into(), page: title.clone(), title, text: text.into(), category: category.into() }
    }
}

pub fn parse_feed(input: &str) -> Result<Vec<FeedRecord>> {
    let trimmed = input.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let body = strip_assignment(trimmed)?;
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => records_from_value(json),
        // several objects, one per line
        Err(_) if body.starts_with('{') && body.lines().filter(|l| !l.trim().is_empty()).count() > 1 => parse_feed_jsonl(body),
        Err(e) => Err(e.into()),
    }
}

pub fn parse_feed_jsonl(input: &str) -> Result<Vec<FeedRecord>> {
    let mut records = Vec::new();
    for (lineno, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: FeedRecord = serde_json::from_str(line)
            .map_err(|e| SearchError::Feed(format!("line {}: {}", lineno + 1, e)))?;
        records.push(record);
    }
    Ok(records)
}

/// Read a feed file; `.jsonl` files are parsed line by line.
pub fn read_feed<P: AsRef<Path>>(path: P) -> Result<Vec<FeedRecord>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|source| SearchError::Io { path: path.to_path_buf(), source })?;
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        parse_feed_jsonl(&text)
    } else {
        parse_feed(&text)
    }
}

/// Merge records that share a location, joining their texts with newlines.
///
/// Generators emit one record per paragraph of a page, all pointing at the
/// same location. The first record's title, page and category win, and the
/// output keeps first-seen order.
pub fn coalesce_by_location(records: Vec<FeedRecord>) -> Vec<FeedRecord> {
    let mut out: Vec<FeedRecord> = Vec::with_capacity(records.len());
    let mut slot: HashMap<String, usize> = HashMap::new();
    for record in records {
        match slot.get(&record.location) {
            Some(&i) => {
                let merged = &mut out[i];
                if !record.text.is_empty() {
                    if !merged.text.is_empty() {
                        merged.text.push('\n');
                    }
                    merged.text.push_str(&record.text);
                }
            }
            None => {
                slot.insert(record.location.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

fn strip_assignment(body: &str) -> Result<&str> {
    if body.starts_with('[') || body.starts_with('{') {
        return Ok(body);
    }
    let (_, rhs) = body
        .split_once('=')
        .ok_or_else(|| SearchError::Feed("expected a JSON payload or a script assignment".into()))?;
    Ok(rhs.trim().trim_end_matches(';').trim_end())
}

fn records_from_value(json: serde_json::Value) -> Result<Vec<FeedRecord>> {
    match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(SearchError::from))
            .collect(),
        serde_json::Value::Object(mut obj) => match obj.remove("docs") {
            Some(docs) => records_from_value(docs),
            None => Ok(vec![serde_json::from_value(serde_json::Value::Object(obj))?]),
        },
        other => Err(SearchError::Feed(format!("expected an array or object, found {}", kind(&other)))),
    }
}

fn kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
