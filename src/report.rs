use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::formats::ReportRow;
use crate::model::MatchResult;

/// Hits printed per request; the CSV record keeps all of them.
const SUMMARY_HITS: usize = 5;
const LIST_SEPARATOR: &str = " | ";

/// Prints matches to stdout and appends them to the CSV record, if any.
pub struct Reporter {
    tracker_url: Url,
    record: Option<(PathBuf, csv::Writer<File>)>,
}

impl Reporter {
    pub fn open(tracker_url: Url, record_path: Option<&Path>) -> anyhow::Result<Self> {
        let record = match record_path {
            Some(path) => Some((path.to_path_buf(), open_record(path)?)),
            None => None,
        };
        Ok(Self {
            tracker_url,
            record,
        })
    }

    pub fn report(&mut self, result: &MatchResult) -> anyhow::Result<()> {
        let summary = render_summary(result, &self.tracker_url);
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(summary.as_bytes())
            .context("write summary")?;
        stdout.flush().context("flush summary")?;

        if let Some((path, writer)) = &mut self.record {
            writer
                .serialize(report_row(result, &self.tracker_url))
                .with_context(|| format!("append record row: {}", path.display()))?;
            writer
                .flush()
                .with_context(|| format!("flush record: {}", path.display()))?;
        }
        Ok(())
    }
}

fn open_record(path: &Path) -> anyhow::Result<csv::Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create record dir: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open record: {}", path.display()))?;
    let is_new = file
        .metadata()
        .with_context(|| format!("stat record: {}", path.display()))?
        .len()
        == 0;
    Ok(csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file))
}

pub fn report_row(result: &MatchResult, tracker_url: &Url) -> ReportRow {
    let request = &result.request;
    ReportRow {
        found_at: chrono::Utc::now().to_rfc3339(),
        request_id: request.id,
        request_url: request.url(tracker_url),
        title: request.full_title(),
        authors: request.authors.join(LIST_SEPARATOR),
        category: request.category_name.clone(),
        hit_count: result.hits.len(),
        hit_titles: join(result.hits.iter().map(|hit| hit.title.as_str())),
        hit_urls: join(result.hits.iter().map(|hit| hit.url.as_str())),
        metadata_url: result.annotation.url.clone().unwrap_or_default(),
        rating_count: result
            .annotation
            .rating_count
            .map(|count| count.to_string())
            .unwrap_or_default(),
        torrent_url: result.torrent_url.clone().unwrap_or_default(),
    }
}

/// Human-readable block for one match.
pub fn render_summary(result: &MatchResult, tracker_url: &Url) -> String {
    let request = &result.request;
    let mut out = String::new();
    out.push_str(&request.full_title());
    out.push('\n');
    out.push_str(&format!("  {}\n", request.url(tracker_url)));
    if !request.authors.is_empty() {
        out.push_str(&format!("  by {}\n", request.authors.join(", ")));
    }

    if let Some(url) = &result.annotation.url {
        match result.annotation.rating_count {
            Some(count) => out.push_str(&format!("  metadata: {url} ({count} ratings)\n")),
            None => out.push_str(&format!("  metadata: {url}\n")),
        }
    }
    if let Some(url) = &result.torrent_url {
        out.push_str(&format!("  already on tracker: {url}\n"));
    }

    if result.hits.len() > SUMMARY_HITS {
        out.push_str(&format!("  got {} hits\n", result.hits.len()));
        out.push_str(&format!("  showing first {SUMMARY_HITS} results\n"));
    }
    for hit in result.hits.iter().take(SUMMARY_HITS) {
        out.push_str(&format!("  {}\n", hit.title));
        out.push_str(&format!("    {}\n", hit.url));
    }
    out.push('\n');
    out
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(LIST_SEPARATOR)
}
