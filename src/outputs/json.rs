//! JSON snapshot file: read as prior state, written atomically.
//!
//! # Output Structure
//!
//! The file is a top-level array, most recent article first:
//! ```text
//! [
//!   {"title": "...", "original_title": "...", "summary": "...",
//!    "source": "BBC", "url": "...", "published_at": "2025-05-06T09:30:00Z",
//!    "content_hash": "..."}
//! ]
//! ```
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so readers never see a partial file and a failed write
//! leaves the previous snapshot in place.

use crate::error::OutputError;
use crate::models::{NewsSnapshot, PublishedArticle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

fn io_error(path: &Path, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot.json".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Read the previous run's snapshot.
///
/// A missing file is the normal first-run case. A file that cannot be read or
/// parsed is logged and treated as empty; the next write replaces it.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_prior(path: &Path, now: DateTime<Utc>) -> NewsSnapshot {
    let text = match fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No prior snapshot; starting fresh");
            return NewsSnapshot::empty(now);
        }
        Err(e) => {
            warn!(error = %e, "Prior snapshot unreadable; starting fresh");
            return NewsSnapshot::empty(now);
        }
    };
    match serde_json::from_str::<Vec<PublishedArticle>>(&text) {
        Ok(articles) => {
            info!(count = articles.len(), "Loaded prior snapshot");
            NewsSnapshot {
                generated_at: now,
                articles,
            }
        }
        Err(e) => {
            warn!(error = %e, "Prior snapshot is not valid JSON; starting fresh");
            NewsSnapshot::empty(now)
        }
    }
}

/// Serialize `value` and atomically replace `path` with it.
async fn write_json_atomic<T: Serialize + ?Sized>(
    value: &T,
    path: &Path,
) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))?;
    }
    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, json).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(io_error(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(io_error(path, e));
    }
    Ok(())
}

/// Write the snapshot's articles as the new output file.
///
/// # Arguments
///
/// * `snapshot` - Articles already in publication order
/// * `path` - Output file; its parent directory is created if missing
///
/// # Returns
///
/// `Ok(())` once the new file is in place. On error the previous file is
/// untouched, since the data goes to a temporary sibling that is only
/// renamed over `path` after a complete write.
#[instrument(
    level = "info",
    skip_all,
    fields(path = %path.display(), count = snapshot.articles.len())
)]
pub async fn write_snapshot(snapshot: &NewsSnapshot, path: &Path) -> Result<(), OutputError> {
    match write_json_atomic(&snapshot.articles, path).await {
        Ok(()) => {
            info!("Wrote snapshot");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to write snapshot");
            Err(e)
        }
    }
}

/// Write any serializable run report next to (or apart from) the snapshot.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report<T: Serialize>(report: &T, path: &Path) -> Result<(), OutputError> {
    write_json_atomic(report, path).await?;
    info!("Wrote run report");
    Ok(())
}
