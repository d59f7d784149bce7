use std::io::{BufRead as _, IsTerminal as _, Write as _};
use std::time::Duration;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::formats::{ListingPage, RawRequest};
use crate::store::SessionStore;
use crate::tracker::{TrackerClient, TrackerError};

/// Consecutive authorization failures tolerated for a single page.
const MAX_REAUTH_ATTEMPTS: u32 = 3;

/// Obtains a fresh tracker session token after the tracker rejected the
/// current one.
pub trait Reauthenticator: Send + Sync {
    /// `Ok(None)` means no token could be obtained and the run must stop.
    fn reauthenticate(&self) -> anyhow::Result<Option<String>>;
}

/// Asks for a new `mam_id` on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Reauthenticator for TerminalPrompt {
    fn reauthenticate(&self) -> anyhow::Result<Option<String>> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            tracing::warn!("tracker session expired and stdin is not a terminal");
            return Ok(None);
        }

        let mut stderr = std::io::stderr();
        write!(
            stderr,
            "Tracker session expired. Paste a fresh mam_id cookie value (empty to abort): "
        )
        .context("write prompt")?;
        stderr.flush().context("flush prompt")?;

        let mut line = String::new();
        stdin.lock().read_line(&mut line).context("read mam_id")?;
        let token = line.trim();
        Ok((!token.is_empty()).then(|| token.to_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Decoded records in delivery order (newest first).
    pub records: Vec<RawRequest>,
    pub pages: usize,
    pub newest_id: Option<u64>,
    /// Paging stopped early because the run was cancelled.
    pub interrupted: bool,
}

pub struct Fetcher<'a> {
    pub tracker: &'a mut TrackerClient,
    pub session: &'a SessionStore,
    pub reauth: &'a dyn Reauthenticator,
    pub retry_delay: Duration,
    pub max_retries: u32,
    /// Stops paging, including mid-request and mid-backoff.
    pub cancel: &'a CancellationToken,
}

impl Fetcher<'_> {
    /// Pages the request listing from the top until the listing is
    /// exhausted, `page_limit` pages were read, or the pages reach back to
    /// ids at or below `cursor`. Cancellation ends paging with whatever was
    /// read so far and `interrupted` set.
    pub async fn fetch_requests(
        &mut self,
        cursor: u64,
        page_limit: usize,
    ) -> anyhow::Result<FetchOutcome> {
        let mut records = Vec::new();
        let mut offset = 0_u64;
        let mut pages = 0_usize;
        let mut min_id: Option<u64> = None;
        let mut newest_id: Option<u64> = None;
        let mut interrupted = false;

        loop {
            if pages >= page_limit {
                tracing::info!(page_limit, "stopped at page limit");
                break;
            }
            let Some(page) = self.fetch_page(offset).await? else {
                tracing::warn!(offset, pages, "request paging interrupted");
                interrupted = true;
                break;
            };
            pages += 1;

            let returned = page.data.len();
            for value in page.data {
                match serde_json::from_value::<RawRequest>(value) {
                    Ok(record) => {
                        min_id = Some(min_id.map_or(record.id, |min| min.min(record.id)));
                        newest_id = Some(newest_id.map_or(record.id, |max| max.max(record.id)));
                        records.push(record);
                    }
                    Err(err) => {
                        tracing::warn!(offset, %err, "skipping undecodable request record");
                    }
                }
            }
            tracing::info!(
                offset,
                returned,
                found = page.found,
                "fetched request page"
            );

            if returned == 0 {
                break;
            }
            let step = page
                .perpage
                .filter(|perpage| *perpage > 0)
                .unwrap_or(u64::try_from(returned).unwrap_or(u64::MAX));
            offset = offset.saturating_add(step);
            if offset >= page.found {
                break;
            }
            if cursor > 0 && min_id.is_some_and(|min| min <= cursor) {
                tracing::debug!(cursor, ?min_id, "reached previously processed requests");
                break;
            }
        }

        if let Some(token) = self.tracker.session_token() {
            self.session
                .save(token)
                .await
                .context("persist tracker session")?;
        }

        Ok(FetchOutcome {
            records,
            pages,
            newest_id,
            interrupted,
        })
    }

    /// `Ok(None)` when cancelled before the page arrived.
    async fn fetch_page(&mut self, offset: u64) -> anyhow::Result<Option<ListingPage>> {
        let mut failures = 0_u32;
        let mut auth_failures = 0_u32;

        loop {
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(None),
                result = self.tracker.list_requests(offset) => result,
            };
            let err = match result {
                Ok(page) => return Ok(Some(page)),
                Err(err) => err,
            };

            match err {
                TrackerError::Unauthorized { status } => {
                    auth_failures += 1;
                    tracing::warn!(offset, %status, attempt = auth_failures, "tracker rejected the session");
                    if auth_failures > MAX_REAUTH_ATTEMPTS {
                        anyhow::bail!(
                            "tracker rejected the session {auth_failures} times in a row ({status})"
                        );
                    }
                    let token = prompt_blocking(self.reauth)
                        .context("re-authenticate with tracker")?;
                    if self.cancel.is_cancelled() {
                        return Ok(None);
                    }
                    let Some(token) = token else {
                        anyhow::bail!(
                            "tracker rejected the session ({status}) and no new session token was provided"
                        );
                    };
                    self.tracker.set_session_token(token);
                }
                err if err.is_transient() => {
                    failures += 1;
                    if failures > self.max_retries {
                        return Err(err).with_context(|| {
                            format!("fetch request page at offset {offset} after {failures} attempts")
                        });
                    }
                    tracing::warn!(
                        offset,
                        attempt = failures,
                        error = %crate::tracker::error_chain(&err),
                        retry_in = ?self.retry_delay,
                        "request page failed; retrying"
                    );
                    tokio::select! {
                        () = self.cancel.cancelled() => return Ok(None),
                        () = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
                err => {
                    return Err(err)
                        .with_context(|| format!("fetch request page at offset {offset}"));
                }
            }
        }
    }
}

/// `block_in_place` panics on a current-thread runtime; there the hook runs
/// inline.
fn prompt_blocking(reauth: &dyn Reauthenticator) -> anyhow::Result<Option<String>> {
    match tokio::runtime::Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(tokio::runtime::RuntimeFlavor::MultiThread) => {
            tokio::task::block_in_place(|| reauth.reauthenticate())
        }
        _ => reauth.reauthenticate(),
    }
}
