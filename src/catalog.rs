//! Streaming-catalog title search.

use std::collections::HashSet;

use anyhow::Context as _;
use url::Url;

use crate::formats::{CatalogResponse, RawCatalogHit, scalar_to_string};
use crate::http::snippet;
use crate::model::{CatalogHit, CatalogKind};
use crate::pacer::Pacer;

/// Long contributor lists would otherwise fan out into dozens of queries.
pub const MAX_AUTHOR_QUERIES: usize = 5;

const PAGE_SIZE: u32 = 48;

const FILTER_SEARCH_QUERY: &str = "query FilterSearch($criteria: SearchCriteria!, $sort: Sort) { \
search(criteria: $criteria, sort: $sort) { found hits { id artKey title subtitle releaseDate \
kind { name } primaryArtist { name } } } }";

#[derive(Debug)]
pub struct CatalogClient {
    client: reqwest::Client,
    endpoint: Url,
    title_url: Url,
    pacer: Pacer,
}

impl CatalogClient {
    pub fn new(client: reqwest::Client, endpoint: Url, title_url: Url, pacer: Pacer) -> Self {
        Self {
            client,
            endpoint,
            title_url,
            pacer,
        }
    }

    /// Searches the catalog once per author (first [`MAX_AUTHOR_QUERIES`]
    /// only) and merges the hits.
    ///
    /// Failed queries count as zero hits for that author. With a
    /// `subtitle`, hits whose title does not contain it are dropped.
    pub async fn search(
        &self,
        title: &str,
        subtitle: Option<&str>,
        authors: &[String],
        category: &str,
    ) -> Vec<CatalogHit> {
        let kind = match category.parse::<CatalogKind>() {
            Ok(kind) => kind,
            Err(_) => {
                tracing::info!(category, title, ?authors, "skipping unrecognized category");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for author in authors.iter().take(MAX_AUTHOR_QUERIES) {
            match self.query(title, author, kind).await {
                Ok(raw_hits) => {
                    tracing::debug!(title, author, hits = raw_hits.len(), "catalog query");
                    found.extend(raw_hits.into_iter().filter_map(|raw| self.to_hit(raw)));
                }
                Err(err) => {
                    tracing::warn!(title, author, error = %format!("{err:#}"), "catalog query failed");
                }
            }
        }

        let found = match subtitle {
            Some(subtitle) => found
                .into_iter()
                .filter(|hit| title_contains(&hit.title, subtitle))
                .collect(),
            None => found,
        };
        dedup_by_url(found)
    }

    async fn query(
        &self,
        title: &str,
        author: &str,
        kind: CatalogKind,
    ) -> anyhow::Result<Vec<RawCatalogHit>> {
        let payload = serde_json::json!({
            "operationName": "FilterSearch",
            "variables": {
                "criteria": {
                    "title": title,
                    "artistName": author,
                    "kindId": kind.kind_id().to_string(),
                    "availability": "ALL_TITLES",
                    "pagination": { "page": 1, "pageSize": PAGE_SIZE },
                },
            },
            "query": FILTER_SEARCH_QUERY,
        });

        self.pacer.wait().await;
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let body = response.text().await.context("read catalog response body")?;
        if !status.is_success() {
            anyhow::bail!("catalog returned {status}: {}", snippet(&body));
        }

        let parsed: CatalogResponse = serde_json::from_str(&body)
            .with_context(|| format!("parse catalog response: {}", snippet(&body)))?;
        Ok(parsed.data.search.hits.unwrap_or_default())
    }

    fn to_hit(&self, raw: RawCatalogHit) -> Option<CatalogHit> {
        let id = scalar_to_string(&raw.id)?;
        let title = match raw.subtitle.as_deref().map(str::trim) {
            Some(subtitle) if !subtitle.is_empty() => format!("{}: {subtitle}", raw.title),
            _ => raw.title,
        };
        Some(CatalogHit {
            url: format!("{}/{id}", self.title_url.as_str().trim_end_matches('/')),
            id,
            title,
            kind: raw.kind.and_then(|kind| kind.name),
            release_date: raw.release_date.as_ref().and_then(scalar_to_string),
            art_key: raw.art_key,
            artist: raw.primary_artist.and_then(|artist| artist.name),
        })
    }
}

/// Case-insensitive substring test.
pub fn title_contains(title: &str, needle: &str) -> bool {
    title.to_lowercase().contains(&needle.to_lowercase())
}

/// Keeps the first hit for every canonical URL, in discovery order.
pub fn dedup_by_url(hits: Vec<CatalogHit>) -> Vec<CatalogHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.url.clone()))
        .collect()
}
