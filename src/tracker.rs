//! Client for the tracker's JSON endpoints: the request listing and the
//! torrent search. Both ride on the `mam_id` session cookie.

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use url::Url;

use crate::formats::{ListingPage, TorrentSearchResponse};
use crate::http::snippet;
use crate::model::CatalogKind;
use crate::pacer::Pacer;

const SESSION_COOKIE: &str = "mam_id";

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker rejected the session ({status})")]
    Unauthorized { status: StatusCode },
    #[error("tracker request failed")]
    Transport(#[source] reqwest::Error),
    #[error("tracker returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed tracker response")]
    Malformed(#[source] serde_json::Error),
}

impl TrackerError {
    /// Worth retrying the same request after a pause.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => false,
            Self::Transport(_) | Self::Malformed(_) => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

#[derive(Debug)]
pub struct TrackerClient {
    client: reqwest::Client,
    base_url: Url,
    pacer: Pacer,
    session_token: Option<String>,
}

impl TrackerClient {
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        pacer: Pacer,
        session_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url,
            pacer,
            session_token,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn set_session_token(&mut self, token: String) {
        self.session_token = Some(token);
    }

    /// One page of unfulfilled requests, newest first, starting at `offset`.
    pub async fn list_requests(&mut self, offset: u64) -> Result<ListingPage, TrackerError> {
        let url = self.endpoint("/tor/json/loadRequests.php");
        let start_number = offset.to_string();
        let query = [
            ("tor[text]", ""),
            ("tor[srchIn][title]", "true"),
            ("tor[viewType]", "unful"),
            ("tor[startDate]", ""),
            ("tor[endDate]", ""),
            ("tor[startNumber]", start_number.as_str()),
            ("tor[sortType]", "dateD"),
        ];

        self.pacer.wait().await;
        tracing::debug!(offset, "GET request listing");
        let request = self
            .with_session(self.client.get(url))
            .query(&query)
            .header(CONTENT_TYPE, "application/json; charset=utf-8");
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(TrackerError::Malformed)
    }

    /// Looks for an existing torrent matching `title` by `author`.
    ///
    /// Any failure is logged and reported as "not found"; callers only need
    /// a yes/no answer.
    pub async fn find_torrent(
        &mut self,
        title: &str,
        author: Option<&str>,
        kind: CatalogKind,
    ) -> Option<String> {
        let text = match author {
            Some(author) => format!("{title} @author {author}"),
            None => title.to_owned(),
        };
        let main_cat = match kind {
            CatalogKind::Audiobooks => "13",
            CatalogKind::Ebooks | CatalogKind::Comics => "14",
        };
        let payload = serde_json::json!({
            "tor": {
                "text": text,
                "srchIn": ["title", "author"],
                "searchType": "all",
                "searchIn": "torrents",
                "cat": ["0"],
                "main_cat": [main_cat],
                "browseFlagsHideVsShow": "0",
                "sortType": "default",
                "startNumber": "0",
                "perpage": 5,
            },
        });

        self.pacer.wait().await;
        let url = self.endpoint("/tor/js/loadSearchJSONbasic.php");
        let request = self.with_session(self.client.post(url)).json(&payload);
        let body = match self.send(request).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(title, error = %error_chain(&err), "torrent search failed");
                return None;
            }
        };

        let response: TorrentSearchResponse = match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(title, %err, body = %snippet(&body), "malformed torrent search response");
                return None;
            }
        };
        if let Some(error) = response.error.as_deref() {
            tracing::debug!(title, error, "torrent search returned no results");
            return None;
        }
        if response.total == 0 {
            return None;
        }
        let first = response.data.first()?;
        Some(format!("{}/t/{}", self.base_str(), first.id))
    }

    async fn send(&mut self, request: reqwest::RequestBuilder) -> Result<String, TrackerError> {
        let response = request.send().await.map_err(TrackerError::Transport)?;
        self.capture_session(&response);

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TrackerError::Unauthorized { status });
        }
        let body = response.text().await.map_err(TrackerError::Transport)?;
        if !status.is_success() {
            return Err(TrackerError::Status {
                status,
                body: snippet(&body),
            });
        }
        Ok(body)
    }

    fn with_session(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_token {
            Some(token) => request.header(COOKIE, format!("{SESSION_COOKIE}={token}")),
            None => request,
        }
    }

    /// The tracker rotates the session cookie; keep the newest one so it can
    /// be persisted at the end of the pass.
    fn capture_session(&mut self, response: &reqwest::Response) {
        let rotated = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|value| !value.is_empty());
        if let Some(token) = rotated
            && self.session_token.as_deref() != Some(token.as_str())
        {
            tracing::debug!("tracker rotated the session cookie");
            self.session_token = Some(token);
        }
    }

    fn base_str(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_str())
    }
}

pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
