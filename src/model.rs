use std::fmt;
use std::str::FromStr;

use url::Url;

/// A normalized "please add this title" entry from the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u64,
    /// Title exactly as delivered, HTML entities included.
    pub raw_title: String,
    /// Decoded title with any subtitle removed.
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub category: u32,
    pub category_name: String,
    pub filled: bool,
    pub duplicate: bool,
    pub language: Option<u32>,
    pub votes: u32,
    pub series: Vec<SeriesEntry>,
}

impl Request {
    /// Decoded title with the subtitle put back, as shown on the tracker.
    pub fn full_title(&self) -> String {
        match &self.subtitle {
            Some(subtitle) => format!("{}: {subtitle}", self.title),
            None => self.title.clone(),
        }
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// Request page on the tracker. The tracker splits the id before its
    /// last five digits, e.g. `123456` becomes `1.23456`.
    pub fn url(&self, tracker_url: &Url) -> String {
        let id = self.id.to_string();
        let split = id.len().saturating_sub(5);
        let base = tracker_url.as_str().trim_end_matches('/');
        format!(
            "{base}/tor/viewRequest.php/{}.{}",
            &id[..split],
            &id[split..]
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesEntry {
    pub name: String,
    pub position: Option<String>,
}

/// The three title kinds the streaming catalog can be searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Ebooks,
    Audiobooks,
    Comics,
}

impl CatalogKind {
    pub fn kind_id(self) -> u32 {
        match self {
            Self::Ebooks => 5,
            Self::Audiobooks => 8,
            Self::Comics => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ebooks => "Ebooks",
            Self::Audiobooks => "Audiobooks",
            Self::Comics => "Comics",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "Ebooks" => Ok(Self::Ebooks),
            "Audiobooks" => Ok(Self::Audiobooks),
            "Comics" => Ok(Self::Comics),
            other => anyhow::bail!("unsupported catalog category: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogHit {
    pub id: String,
    /// Canonical title page; hits are unique by this.
    pub url: String,
    /// Title with `": {subtitle}"` appended when the item has one.
    pub title: String,
    pub kind: Option<String>,
    pub release_date: Option<String>,
    pub art_key: Option<String>,
    pub artist: Option<String>,
}

/// Metadata-site signals for a request. Empty when the lookup failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub url: Option<String>,
    pub rating_count: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub request: Request,
    pub hits: Vec<CatalogHit>,
    pub annotation: Annotation,
    /// Existing torrent for the same title on the tracker, if any.
    pub torrent_url: Option<String>,
}
