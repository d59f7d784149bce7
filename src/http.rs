use std::time::Duration;

use anyhow::Context as _;

const USER_AGENT: &str = concat!("reqscout/", env!("CARGO_PKG_VERSION"));
const BODY_SNIPPET_CHARS: usize = 200;

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("build http client")
}

/// First few hundred characters of a response body, for log lines.
pub fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_owned(),
    }
}
