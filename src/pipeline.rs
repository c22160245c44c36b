//! Top-level space export pipeline.
//!
//! Coordinates one run: clear the destination bucket, resolve the space and
//! its homepage, discover the page tree, then export every page
//! sequentially and aggregate the outcomes into a [`SpaceExportReport`].
//!
//! Fatal stages (bucket clear, id resolution, traversal) abort the run with
//! a [`PipelineError`]; per-page failures are absorbed into the report's
//! `DOWNLOAD_FAILED` bucket by the orchestrator and never abort anything.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::contract::{ConfluenceApi, PageId, PageOutcome};
use crate::error::PipelineError;
use crate::export::{export_page, ExportDestination};
use crate::tree;

/// Outcome → pages exhibiting it, in export order. One entry per discovered
/// page, unless the run was cancelled before reaching it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SpaceExportReport {
    outcomes: BTreeMap<PageOutcome, Vec<PageId>>,
}

impl SpaceExportReport {
    pub fn record(&mut self, outcome: PageOutcome, page_id: PageId) {
        self.outcomes.entry(outcome).or_default().push(page_id);
    }

    /// Pages that ended in `outcome`, in the order they were exported.
    pub fn pages_with(&self, outcome: PageOutcome) -> &[PageId] {
        self.outcomes.get(&outcome).map_or(&[], Vec::as_slice)
    }

    /// Number of pages that received any outcome.
    pub fn total_pages(&self) -> usize {
        self.outcomes.values().map(Vec::len).sum()
    }
}

/// Run-level cancellation handle. Cancelling stops the pipeline from
/// issuing new page exports; the in-flight page finishes normally.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Export every page of the configured space into `destination`.
///
/// The bucket is cleared before anything else touches it, so a successful
/// run always leaves a consistent snapshot: only objects uploaded by this
/// run exist afterwards.
pub async fn export_space<A>(
    api: &A,
    destination: &ExportDestination,
    config: &Config,
    cancel: &CancelFlag,
) -> Result<SpaceExportReport, PipelineError>
where
    A: ConfluenceApi + ?Sized,
{
    if let ExportDestination::Bucket(store) = destination {
        store.clear().await?;
    }

    info!(space_key = %config.space_key, "Starting Confluence space export");
    let space_id = api.resolve_space_id(&config.space_key).await?;
    info!(%space_id, "Resolved space");

    let homepage_id = api.resolve_homepage_id(&space_id).await?;
    info!(%homepage_id, "Resolved homepage");

    let pages = tree::discover(api, &homepage_id).await?;
    info!(pages = pages.len(), "Discovered pages to export");

    let mut report = SpaceExportReport::default();
    for (page_id, title) in pages {
        if cancel.is_cancelled() {
            warn!(
                exported = report.total_pages(),
                "Run cancelled, not issuing further page exports"
            );
            break;
        }
        let outcome = export_page(
            api,
            destination,
            &page_id,
            Some(title.as_str()),
            config.wait_seconds,
        )
        .await?;
        report.record(outcome, page_id);
    }

    info!(
        empty = report.pages_with(PageOutcome::EmptyPage).len(),
        successful = report.pages_with(PageOutcome::DownloadSuccessful).len(),
        failed = report.pages_with(PageOutcome::DownloadFailed).len(),
        "Space export finished"
    );
    Ok(report)
}

/// Caller-facing envelope: `status` 1 on success, -1 on any fatal stage
/// failure, with the report or the error detail under `data`.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub status: i32,
    pub msg: String,
    pub data: serde_json::Value,
}

impl ExportResponse {
    pub fn success(report: &SpaceExportReport) -> Self {
        Self {
            status: 1,
            msg: "Confluence space download successful".to_owned(),
            data: serde_json::to_value(report).unwrap_or_else(|e| {
                error!(error = %e, "Could not serialize export report");
                json!(null)
            }),
        }
    }

    pub fn failure(msg: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self {
            status: -1,
            msg: msg.into(),
            data: json!(detail.to_string()),
        }
    }
}
