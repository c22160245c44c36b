//! Per-page export orchestration.
//!
//! One call to [`export_page`] drives a single page through the whole
//! export state machine: empty check, export initiation, settling delay,
//! download, persistence, bounded retry with adaptive backoff. The routine
//! classifies every normal failure into a [`PageOutcome`]; only an
//! authentication failure escapes as an error.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use bytes::Bytes;
use regex::Regex;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::contract::{BucketStore, ConfluenceApi, PageId, PageOutcome};
use crate::error::ApiError;

/// Retry budget per page.
const MAX_ATTEMPTS: u32 = 3;
/// Pause between two attempts, on top of the settling delay.
const RETRY_PAUSE: Duration = Duration::from_secs(10);
/// Settling delay growth after each failed attempt.
const BACKOFF_STEP: Duration = Duration::from_secs(10);

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// Where a downloaded PDF ends up.
#[derive(Clone)]
pub enum ExportDestination {
    /// Stream into the bucket bound by the store.
    Bucket(Arc<dyn BucketStore>),
    /// Write under a local directory, created on demand.
    LocalDir(PathBuf),
}

/// Retry bookkeeping owned by a single page's export call. Nothing outside
/// the call ever observes or mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub wait: Duration,
}

impl RetryState {
    pub fn new(wait_seconds: u64) -> Self {
        Self {
            attempt: 0,
            wait: Duration::from_secs(wait_seconds),
        }
    }

    /// Record a failed attempt and grow the settling delay, so a later
    /// attempt gives the export job strictly more time to finish.
    pub fn record_failure(&mut self) {
        self.attempt += 1;
        self.wait += BACKOFF_STEP;
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= MAX_ATTEMPTS
    }
}

/// Export one page as PDF into `destination`.
///
/// Resolves the title when the caller has none, short-circuits empty pages,
/// then attempts the export/settle/download sequence up to three times.
/// Returns the page's terminal [`PageOutcome`]; only [`ApiError::Auth`]
/// propagates.
pub async fn export_page<A>(
    api: &A,
    destination: &ExportDestination,
    page_id: &PageId,
    title: Option<&str>,
    wait_seconds: u64,
) -> Result<PageOutcome, ApiError>
where
    A: ConfluenceApi + ?Sized,
{
    let title = match title {
        Some(t) => t.to_owned(),
        None => match api.get_title(page_id).await {
            Ok(t) => t,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                // A page we cannot name can still be exported; the id keeps
                // the filename unique.
                warn!(%page_id, error = %e, "Could not resolve title, using page id");
                page_id.to_string()
            }
        },
    };
    let filename = export_filename(&title, page_id);

    match api.is_empty(page_id).await {
        Ok(true) => {
            info!(%page_id, filename, "Page is empty, skipping export");
            return Ok(PageOutcome::EmptyPage);
        }
        Ok(false) => {}
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            // Undecidable emptiness is treated as content; the export
            // attempts below will settle it.
            warn!(%page_id, error = %e, "Emptiness check failed, attempting export anyway");
        }
    }

    let mut retry = RetryState::new(wait_seconds);
    while !retry.exhausted() {
        let url = match api.initiate_pdf_export(page_id).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                warn!(%page_id, attempt = retry.attempt + 1, "Export initiation produced no URL");
                None
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(%page_id, attempt = retry.attempt + 1, error = %e, "Export initiation failed");
                None
            }
        };

        if let Some(url) = url {
            // The export side is asynchronous: downloading too early 404s.
            sleep(retry.wait).await;

            match download_to_destination(api, destination, &url, &filename).await {
                Ok(true) => {
                    info!(%page_id, filename, "Page exported successfully");
                    return Ok(PageOutcome::DownloadSuccessful);
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%page_id, attempt = retry.attempt + 1, error = %e, "Download failed");
                }
            }
        }

        retry.record_failure();
        if !retry.exhausted() {
            info!(
                %page_id,
                attempt = retry.attempt,
                next_wait_seconds = retry.wait.as_secs(),
                "Attempt failed, retrying"
            );
            sleep(RETRY_PAUSE).await;
        }
    }

    error!(%page_id, filename, attempts = MAX_ATTEMPTS, "All export attempts failed");
    Ok(PageOutcome::DownloadFailed)
}

/// Fetch the rendered PDF and persist it. `Ok(false)` means a retryable
/// failure (non-200 download, store or filesystem trouble).
async fn download_to_destination<A>(
    api: &A,
    destination: &ExportDestination,
    presigned_url: &str,
    filename: &str,
) -> Result<bool, ApiError>
where
    A: ConfluenceApi + ?Sized,
{
    let Some(body) = api.fetch_export_pdf(presigned_url).await? else {
        return Ok(false);
    };

    match destination {
        ExportDestination::Bucket(store) => {
            if let Err(e) = store.upload(filename, body, "application/pdf").await {
                warn!(filename, error = %e, "Bucket upload failed");
                return Ok(false);
            }
        }
        ExportDestination::LocalDir(dir) => {
            if let Err(e) = write_local(dir, filename, &body).await {
                warn!(filename, error = %e, "Local write failed");
                return Ok(false);
            }
        }
    }
    Ok(true)
}

async fn write_local(dir: &Path, filename: &str, body: &Bytes) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(filename), body).await
}

/// Build the `.pdf` filename for a page.
///
/// The title is trimmed, spaces become underscores and every remaining
/// non-word character is stripped. Titles that collapse to nothing (all
/// punctuation) fall back to the page id. The id suffix is always appended
/// so that titles differing only in punctuation cannot collide.
pub fn export_filename(title: &str, page_id: &PageId) -> String {
    let joined = title.trim().replace(' ', "_");
    let safe = NON_WORD.replace_all(&joined, "");
    // A title made only of symbols collapses to nothing (or bare join
    // characters); the page id then has to carry the name.
    let stem: &str = if safe.chars().any(char::is_alphanumeric) {
        safe.as_ref()
    } else {
        page_id.as_str()
    };
    format!("{stem}_confluencePageId={page_id}.pdf")
}
