use std::collections::{HashSet, VecDeque};

use anyhow::Context as _;
use scraper::Html;

use crate::formats::{RawRequest, scalar_to_string};
use crate::model::{Request, SeriesEntry};
use crate::store::CursorStore;

/// One request per id, decoded, oldest first.
pub fn normalize(raw: &[RawRequest]) -> Vec<Request> {
    let mut seen = HashSet::new();
    let mut requests = raw
        .iter()
        .filter(|record| seen.insert(record.id))
        .map(normalize_one)
        .collect::<Vec<_>>();
    requests.sort_by_key(|request| request.id);
    requests
}

fn normalize_one(raw: &RawRequest) -> Request {
    let decoded = decode_html(&raw.title);
    let (title, subtitle) = split_title(&decoded);

    Request {
        id: raw.id,
        raw_title: raw.title.clone(),
        title,
        subtitle,
        authors: decode_authors(raw.authors.as_deref()),
        category: u32::try_from(raw.category).unwrap_or(u32::MAX),
        category_name: raw.cat_name.trim().to_owned(),
        filled: raw.filled != 0,
        duplicate: raw.torsatch != 0,
        language: raw.lang_code.and_then(|code| u32::try_from(code).ok()),
        votes: u32::try_from(raw.votes).unwrap_or(u32::MAX),
        series: decode_series(raw.series_info.as_deref()),
    }
}

/// Plain text of an HTML-escaped title (`Pride &amp; Prejudice`).
pub fn decode_html(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text = fragment.root_element().text().collect::<String>();
    text.trim().to_owned()
}

/// Splits at the first `": "`.
pub fn split_title(title: &str) -> (String, Option<String>) {
    match title.split_once(": ") {
        Some((base, subtitle)) if !subtitle.trim().is_empty() => {
            (base.trim().to_owned(), Some(subtitle.trim().to_owned()))
        }
        Some((base, _)) => (base.trim().to_owned(), None),
        None => (title.trim().to_owned(), None),
    }
}

/// Decodes the `{"<id>": "<name>", ...}` author encoding, keeping order.
pub fn decode_authors(encoded: Option<&str>) -> Vec<String> {
    let Some(value) = parse_encoded(encoded) else {
        return Vec::new();
    };
    let names: Vec<&serde_json::Value> = match &value {
        serde_json::Value::Object(map) => map.values().collect(),
        serde_json::Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .filter_map(serde_json::Value::as_str)
        .map(decode_html)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Decodes the `{"<id>": ["<name>", "<position>"], ...}` series encoding.
pub fn decode_series(encoded: Option<&str>) -> Vec<SeriesEntry> {
    let Some(serde_json::Value::Object(map)) = parse_encoded(encoded) else {
        return Vec::new();
    };
    map.values()
        .filter_map(|value| match value {
            serde_json::Value::Array(values) => {
                let name = values.first().and_then(serde_json::Value::as_str)?;
                let position = values
                    .get(1)
                    .and_then(scalar_to_string)
                    .filter(|position| !position.trim().is_empty());
                Some(SeriesEntry {
                    name: decode_html(name),
                    position,
                })
            }
            serde_json::Value::String(name) => Some(SeriesEntry {
                name: decode_html(name),
                position: None,
            }),
            _ => None,
        })
        .filter(|entry| !entry.name.is_empty())
        .collect()
}

fn parse_encoded(encoded: Option<&str>) -> Option<serde_json::Value> {
    let encoded = encoded?.trim();
    if encoded.is_empty() {
        return None;
    }
    match serde_json::from_str(encoded) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(%err, encoded, "undecodable encoded field");
            None
        }
    }
}

/// Hands requests to the consumer oldest first, persisting the cursor to
/// each request's id before it is handed over.
///
/// Requests at or below the starting cursor were only fetched to find the
/// overlap with the previous run and are dropped here.
#[derive(Debug)]
pub struct CommitQueue {
    pending: VecDeque<Request>,
}

impl CommitQueue {
    pub fn new(requests: Vec<Request>, start_cursor: u64) -> Self {
        let mut pending = requests
            .into_iter()
            .filter(|request| request.id > start_cursor)
            .collect::<Vec<_>>();
        pending.sort_by_key(|request| request.id);
        Self {
            pending: pending.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// `Ok(None)` once every request was delivered. A failed cursor write
    /// keeps the request queued and is returned as an error.
    pub async fn next(&mut self, cursor: &mut CursorStore) -> anyhow::Result<Option<Request>> {
        let Some(request) = self.pending.front() else {
            return Ok(None);
        };
        cursor
            .commit(request.id)
            .await
            .with_context(|| format!("commit cursor {}", request.id))?;
        Ok(self.pending.pop_front())
    }
}
