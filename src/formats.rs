//! Serialized shapes: remote API payloads, persisted state and the CSV record.

use serde::{Deserialize, Deserializer, Serialize};

/// One page of the tracker's request listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPage {
    /// Raw records; each is decoded on its own so one bad record does not
    /// poison the page.
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "loose_u64")]
    pub found: u64,
    #[serde(default, deserialize_with = "loose_opt_u64")]
    pub perpage: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    #[serde(deserialize_with = "loose_u64")]
    pub id: u64,
    pub title: String,
    /// JSON-encoded `{key: name}` map.
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default, deserialize_with = "loose_u64")]
    pub category: u64,
    #[serde(default)]
    pub cat_name: String,
    #[serde(default, deserialize_with = "loose_u64")]
    pub filled: u64,
    #[serde(default, deserialize_with = "loose_u64")]
    pub torsatch: u64,
    #[serde(default, deserialize_with = "loose_opt_u64")]
    pub lang_code: Option<u64>,
    #[serde(default, deserialize_with = "loose_u64")]
    pub votes: u64,
    /// JSON-encoded `{key: [name, position]}` map.
    #[serde(default)]
    pub series_info: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TorrentSearchResponse {
    #[serde(default, deserialize_with = "loose_u64")]
    pub total: u64,
    #[serde(default)]
    pub data: Vec<TorrentEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentEntry {
    #[serde(deserialize_with = "loose_u64")]
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    pub data: CatalogData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogData {
    pub search: CatalogSearch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSearch {
    #[serde(default)]
    pub hits: Option<Vec<RawCatalogHit>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCatalogHit {
    pub id: serde_json::Value,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub kind: Option<NamedRef>,
    #[serde(default)]
    pub release_date: Option<serde_json::Value>,
    #[serde(default)]
    pub art_key: Option<String>,
    #[serde(default)]
    pub primary_artist: Option<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCompleteEntry {
    #[serde(default)]
    pub book_url: Option<String>,
    #[serde(default, deserialize_with = "loose_opt_u64")]
    pub ratings_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub mam_id: String,
    pub saved_at: String,
}

/// One row of the append-only match record. Column order is fixed.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub found_at: String,
    pub request_id: u64,
    pub request_url: String,
    pub title: String,
    pub authors: String,
    pub category: String,
    pub hit_count: usize,
    pub hit_titles: String,
    pub hit_urls: String,
    pub metadata_url: String,
    pub rating_count: String,
    pub torrent_url: String,
}

/// Renders a JSON scalar the way a human would read it (`"5"` → `5`, not `"5"`).
pub fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(u64),
    Float(f64),
    Flag(bool),
    Text(String),
}

impl Loose {
    fn into_u64(self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(n),
            Self::Float(f) if f >= 0.0 => Some(f as u64),
            Self::Float(_) => None,
            Self::Flag(b) => Some(u64::from(b)),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Accepts `5`, `"5"`, `true` or `null` (as 0); the tracker is not
/// consistent about numeric field types.
fn loose_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_opt_u64(deserializer)?.unwrap_or(0))
}

fn loose_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(value.and_then(Loose::into_u64))
}
