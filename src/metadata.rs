use anyhow::Context as _;
use url::Url;

use crate::formats::AutoCompleteEntry;
use crate::http::snippet;
use crate::model::Annotation;
use crate::pacer::Pacer;

/// Book metadata site auto-complete lookups.
#[derive(Debug)]
pub struct MetadataClient {
    client: reqwest::Client,
    endpoint: Url,
    pacer: Pacer,
}

impl MetadataClient {
    pub fn new(client: reqwest::Client, endpoint: Url, pacer: Pacer) -> Self {
        Self {
            client,
            endpoint,
            pacer,
        }
    }

    /// Looks up `"{title} {author}"` and annotates from the first candidate.
    /// Never fails: any problem is logged and yields an empty annotation.
    pub async fn lookup(&self, title: &str, author: Option<&str>) -> Annotation {
        let query = match author {
            Some(author) => format!("{title} {author}"),
            None => title.to_owned(),
        };
        match self.try_lookup(&query).await {
            Ok(annotation) => annotation,
            Err(err) => {
                tracing::warn!(query, error = %format!("{err:#}"), "metadata lookup failed");
                Annotation::default()
            }
        }
    }

    async fn try_lookup(&self, query: &str) -> anyhow::Result<Annotation> {
        self.pacer.wait().await;
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("format", "json"), ("q", query)])
            .send()
            .await
            .with_context(|| format!("GET {}", self.endpoint))?;

        let status = response.status();
        let body = response.text().await.context("read metadata response body")?;
        if !status.is_success() {
            anyhow::bail!("metadata site returned {status}: {}", snippet(&body));
        }

        let entries: Vec<AutoCompleteEntry> = serde_json::from_str(&body)
            .with_context(|| format!("parse metadata response: {}", snippet(&body)))?;
        let Some(first) = entries.into_iter().next() else {
            return Ok(Annotation::default());
        };

        let url = match first.book_url.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Some(
                self.endpoint
                    .join(path)
                    .with_context(|| format!("resolve book url: {path}"))?
                    .to_string(),
            ),
            _ => None,
        };
        Ok(Annotation {
            url,
            rating_count: first.ratings_count,
        })
    }
}
