use std::path::PathBuf;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogClient;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::crossref::cross_reference;
use crate::fetch::{Fetcher, Reauthenticator, TerminalPrompt};
use crate::filter::{catalog_kind, is_eligible};
use crate::metadata::MetadataClient;
use crate::model::{MatchResult, Request};
use crate::normalize::{CommitQueue, normalize};
use crate::pacer::Pacer;
use crate::report::Reporter;
use crate::store::{CursorStore, SessionStore};
use crate::tracker::TrackerClient;

/// Everything one run needs, built once from config and persisted state.
pub struct RunContext {
    pub config: Config,
    pub cursor: CursorStore,
    pub session: SessionStore,
    pub tracker: TrackerClient,
    pub catalog: CatalogClient,
    pub metadata: MetadataClient,
    pub reporter: Reporter,
}

impl RunContext {
    pub async fn open(config: Config, record_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let cursor = CursorStore::open(config.cursor_path())
            .await
            .context("open cursor")?;
        let session = SessionStore::new(config.session_path());
        let session_token = match config.session_token.clone() {
            Some(token) => Some(token),
            None => session.load().await.context("load tracker session")?,
        };
        if session_token.is_none() {
            tracing::warn!("no tracker session token; set REQSCOUT_MAM_ID or run `session set`");
        }

        let client = crate::http::build_client()?;
        let tracker = TrackerClient::new(
            client.clone(),
            config.tracker_url.clone(),
            Pacer::new("tracker", config.request_delay),
            session_token,
        );
        let catalog = CatalogClient::new(
            client.clone(),
            config.catalog_url.clone(),
            config.catalog_title_url.clone(),
            Pacer::new("catalog", config.request_delay),
        );
        let metadata = MetadataClient::new(
            client,
            config.metadata_url.clone(),
            Pacer::new("metadata", config.request_delay),
        );
        let reporter = Reporter::open(config.tracker_url.clone(), record_path.as_deref())
            .context("open reporter")?;

        Ok(Self {
            config,
            cursor,
            session,
            tracker,
            catalog,
            metadata,
            reporter,
        })
    }

    /// Searches, cross-references and reports a single delivered request.
    /// `Ok(None)` when the request is skipped or has no catalog hits.
    pub async fn process(&mut self, request: Request) -> anyhow::Result<Option<MatchResult>> {
        if !is_eligible(&request) {
            tracing::debug!(request_id = request.id, category = %request.category_name, "not eligible");
            return Ok(None);
        }
        let Some(kind) = catalog_kind(&request) else {
            tracing::debug!(
                request_id = request.id,
                category = request.category,
                "category has no catalog lookup"
            );
            return Ok(None);
        };

        let hits = self
            .catalog
            .search(
                &request.title,
                request.subtitle.as_deref(),
                &request.authors,
                kind.as_str(),
            )
            .await;
        if hits.is_empty() {
            return Ok(None);
        }

        let xref = cross_reference(&request, kind, &self.metadata, &mut self.tracker).await;
        let result = MatchResult {
            request,
            hits,
            annotation: xref.annotation,
            torrent_url: xref.torrent_url,
        };
        self.reporter
            .report(&result)
            .with_context(|| format!("report request {}", result.request.id))?;
        Ok(Some(result))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub delivered: usize,
    pub matched: usize,
    pub failed: usize,
    pub cursor: u64,
    pub interrupted: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = Config::from_env().context("load config")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; stopping");
            on_signal.cancel();
        }
    });

    let summary = run_with(config, args, &TerminalPrompt, &cancel).await?;
    if summary.interrupted {
        anyhow::bail!(
            "interrupted after delivering {} requests; cursor at {}",
            summary.delivered,
            summary.cursor
        );
    }
    Ok(())
}

/// Fetch → normalize → commit → filter → search → cross-reference → report.
///
/// Cancelling `cancel` stops paging immediately (nothing is committed yet)
/// or, once delivery started, before the next request. The summary then has
/// `interrupted` set.
pub async fn run_with(
    config: Config,
    args: RunArgs,
    reauth: &dyn Reauthenticator,
    cancel: &CancellationToken,
) -> anyhow::Result<RunSummary> {
    let mut ctx = RunContext::open(config, args.out.map(PathBuf::from)).await?;

    let start_cursor = args.since.unwrap_or(ctx.cursor.value());
    tracing::info!(
        cursor = start_cursor,
        stored_cursor = ctx.cursor.value(),
        max_pages = args.max_pages,
        "fetching unfulfilled requests"
    );

    let outcome = Fetcher {
        tracker: &mut ctx.tracker,
        session: &ctx.session,
        reauth,
        retry_delay: ctx.config.retry_delay,
        max_retries: ctx.config.max_retries,
        cancel,
    }
    .fetch_requests(start_cursor, args.max_pages)
    .await
    .context("fetch requests")?;

    let mut summary = RunSummary {
        fetched: outcome.records.len(),
        cursor: ctx.cursor.value(),
        interrupted: outcome.interrupted,
        ..RunSummary::default()
    };
    if outcome.interrupted {
        tracing::info!(fetched = summary.fetched, cursor = summary.cursor, "run interrupted while fetching");
        return Ok(summary);
    }
    let mut queue = CommitQueue::new(normalize(&outcome.records), start_cursor);
    tracing::info!(
        fetched = summary.fetched,
        pages = outcome.pages,
        newest_id = ?outcome.newest_id,
        new = queue.len(),
        "normalized requests"
    );

    loop {
        if cancel.is_cancelled() {
            summary.interrupted = true;
            break;
        }
        let Some(request) = queue.next(&mut ctx.cursor).await? else {
            break;
        };
        summary.delivered += 1;

        let request_id = request.id;
        match ctx.process(request).await {
            Ok(Some(_)) => summary.matched += 1,
            Ok(None) => {}
            Err(err) => {
                summary.failed += 1;
                tracing::error!(request_id, error = %format!("{err:#}"), "request processing failed");
            }
        }
    }

    summary.cursor = ctx.cursor.value();
    tracing::info!(
        delivered = summary.delivered,
        matched = summary.matched,
        failed = summary.failed,
        cursor = summary.cursor,
        interrupted = summary.interrupted,
        "run finished"
    );
    Ok(summary)
}
