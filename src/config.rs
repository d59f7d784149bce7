use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

const DEFAULT_TRACKER_URL: &str = "https://www.myanonamouse.net";
const DEFAULT_CATALOG_URL: &str = "https://patron-api-gateway.hoopladigital.com/graphql";
const DEFAULT_CATALOG_TITLE_URL: &str = "https://www.hoopladigital.com/title";
const DEFAULT_METADATA_URL: &str = "https://www.goodreads.com/book/auto_complete";

/// Process-wide settings, read once from `REQSCOUT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub tracker_url: Url,
    pub catalog_url: Url,
    pub catalog_title_url: Url,
    pub metadata_url: Url,
    /// Minimum spacing between two requests to the same remote service.
    pub request_delay: Duration,
    /// Fixed backoff before retrying a failed listing page.
    pub retry_delay: Duration,
    pub max_retries: u32,
    /// Overrides the stored tracker session when set.
    pub session_token: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = match std::env::var("REQSCOUT_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine a data dir; set REQSCOUT_DATA_DIR"))?
                .join("reqscout"),
        };

        Ok(Self {
            data_dir,
            tracker_url: url_from_env("REQSCOUT_TRACKER_URL", DEFAULT_TRACKER_URL)?,
            catalog_url: url_from_env("REQSCOUT_CATALOG_URL", DEFAULT_CATALOG_URL)?,
            catalog_title_url: url_from_env(
                "REQSCOUT_CATALOG_TITLE_URL",
                DEFAULT_CATALOG_TITLE_URL,
            )?,
            metadata_url: url_from_env("REQSCOUT_METADATA_URL", DEFAULT_METADATA_URL)?,
            request_delay: Duration::from_millis(u64_from_env("REQSCOUT_REQUEST_DELAY_MS", 1000)?),
            retry_delay: Duration::from_millis(u64_from_env("REQSCOUT_RETRY_DELAY_MS", 10_000)?),
            max_retries: u64_from_env("REQSCOUT_MAX_RETRIES", 5)?
                .try_into()
                .context("REQSCOUT_MAX_RETRIES is too large")?,
            session_token: std::env::var("REQSCOUT_MAM_ID")
                .ok()
                .map(|token| token.trim().to_owned())
                .filter(|token| !token.is_empty()),
        })
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.data_dir.join("cursor")
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

fn url_from_env(key: &str, default: &str) -> anyhow::Result<Url> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_owned());
    let raw = raw.trim().trim_end_matches('/');
    Url::parse(raw).with_context(|| format!("invalid {key}={raw:?}"))
}

fn u64_from_env(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}={raw:?}: expected an integer")),
        Err(_) => Ok(default),
    }
}
