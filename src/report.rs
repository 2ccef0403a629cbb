//! Per-run ledger of what happened to every input URL.
//!
//! Each run appends one JSON line per URL to `<dir>/run-<timestamp>.jsonl`,
//! so a batch can be audited or retried from its failures afterwards.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::archive::ProcessOutcome;
use crate::error::ArchiveError;
use crate::reddit::url::post_id_from_url;
use crate::store::Bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Skipped,
    Failed,
}

/// One line of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub ts: DateTime<Utc>,
    pub id: Option<String>,
    pub status: RunStatus,
    pub url: String,
    pub bucket: Option<Bucket>,
    pub out_path: Option<PathBuf>,
    pub reason: Option<String>,
    pub http_status: Option<u16>,
}

impl ReportEntry {
    /// Describe the result of processing `url`.
    #[must_use]
    pub fn from_result(url: &str, result: &Result<ProcessOutcome, ArchiveError>) -> Self {
        let mut entry = Self {
            ts: Utc::now(),
            id: post_id_from_url(url),
            status: RunStatus::Failed,
            url: url.to_string(),
            bucket: None,
            out_path: None,
            reason: None,
            http_status: None,
        };

        match result {
            Ok(ProcessOutcome::Saved { bucket, path }) => {
                entry.status = RunStatus::Success;
                entry.set_location(*bucket, path);
            }
            Ok(ProcessOutcome::Skipped { bucket, path }) => {
                entry.status = RunStatus::Skipped;
                entry.reason = Some("already archived".to_string());
                entry.set_location(*bucket, path);
            }
            Err(e) => {
                entry.reason = Some(e.to_string());
                entry.http_status = e.http_status().map(|status| status.as_u16());
            }
        }
        entry
    }

    fn set_location(&mut self, bucket: Bucket, path: &Path) {
        // Short links carry no id in the input URL; the record name has it.
        if self.id.is_none() {
            self.id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string);
        }
        self.bucket = Some(bucket);
        self.out_path = Some(path.to_path_buf());
    }
}

/// Append-only JSONL writer for one run.
#[derive(Debug)]
pub struct RunReport {
    path: PathBuf,
    file: File,
}

impl RunReport {
    /// Create `<dir>/run-<YYYYmmdd-HHMMSS>.jsonl`, appending if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub async fn create(dir: &Path) -> Result<Self, ArchiveError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ArchiveError::io(dir, e))?;

        let path = dir.join(format!("run-{}.jsonl", Utc::now().format("%Y%m%d-%H%M%S")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be serialized or written.
    pub async fn record(&mut self, entry: &ReportEntry) -> Result<(), ArchiveError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))
    }
}
