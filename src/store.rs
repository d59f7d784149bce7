use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio::fs;

use crate::formats::SessionFile;

/// Highest request id delivered by any previous run.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
    value: u64,
}

impl CursorStore {
    /// A missing file reads as cursor 0.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let value = match fs::read_to_string(&path).await {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("parse cursor: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => {
                return Err(err).with_context(|| format!("read cursor: {}", path.display()));
            }
        };
        Ok(Self { path, value })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advances and persists the cursor. Values at or below the current
    /// cursor are ignored so the stored cursor never decreases.
    pub async fn commit(&mut self, id: u64) -> anyhow::Result<()> {
        if id <= self.value {
            return Ok(());
        }
        write_atomic(&self.path, id.to_string().as_bytes())
            .await
            .context("write cursor")?;
        self.value = id;
        tracing::debug!(cursor = id, "cursor committed");
        Ok(())
    }
}

/// The tracker session token (`mam_id` cookie) kept between runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> anyhow::Result<Option<String>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("read session: {}", self.path.display()));
            }
        };
        let session: SessionFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse session: {}", self.path.display()))?;
        Ok(Some(session.mam_id).filter(|token| !token.is_empty()))
    }

    pub async fn save(&self, token: &str) -> anyhow::Result<()> {
        let session = SessionFile {
            mam_id: token.to_owned(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        let data = serde_json::to_vec_pretty(&session).context("serialize session")?;
        write_atomic(&self.path, &data).await.context("write session")
    }
}

/// Writes to a sibling temp file and renames it over `path`, so readers
/// see either the old or the new contents, never a truncated file.
async fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
