//! Trait seams and shared domain types for the export pipeline.
//!
//! This module is the *interface* layer: the orchestration code only ever
//! talks to [`ConfluenceApi`] and [`BucketStore`], so the HTTP and
//! object-storage details stay swappable and the pipeline is testable with
//! deterministic mocks.
//!
//! Both traits are annotated for `mockall`, gated behind the
//! `test-export-mocks` feature so integration tests outside the crate can use
//! the generated `MockConfluenceApi` / `MockBucketStore`.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::Serialize;

use crate::error::{ApiError, StoreError};

/// Authentication material for a Confluence cloud instance.
///
/// Passed by reference through every remote call. The `Debug` impl redacts
/// the API token so credentials can never leak through logs.
#[derive(Clone)]
pub struct Credentials {
    /// Instance domain, e.g. `your-domain.atlassian.net`.
    pub domain: String,
    /// Email of the Confluence user.
    pub email: String,
    /// API token paired with the email for HTTP Basic auth.
    pub api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Opaque identifier of a Confluence space. Never parsed, only compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SpaceId(pub String);

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a Confluence page. Never parsed, only compared and
/// embedded in filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PageId(pub String);

impl PageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        PageId(s.to_owned())
    }
}

/// Transient pair correlating an asynchronous PDF-rendering job with its
/// eventual download location. Lives for a single export attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTask {
    pub task_id: String,
    pub cloud_id: String,
}

/// Terminal classification of one page within one run. Never revised after
/// being returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PageOutcome {
    #[serde(rename = "EMPTY_PAGE")]
    EmptyPage,
    #[serde(rename = "DOWNLOAD_SUCCESSFUL")]
    DownloadSuccessful,
    #[serde(rename = "DOWNLOAD_FAILED")]
    DownloadFailed,
}

/// Authenticated access to the Confluence REST surface.
///
/// One method per endpoint the pipeline needs; the implementation owns the
/// HTTP client and credentials. See `confluence::RestConfluenceClient` for
/// the real client and the endpoint documentation links.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ConfluenceApi: Send + Sync {
    /// Resolve a space key (e.g. `OR`) to its space id.
    async fn resolve_space_id(&self, space_key: &str) -> Result<SpaceId, ApiError>;

    /// Find the space's homepage: the unique page with no parent.
    /// Fails with [`ApiError::HomepageNotFound`] if no such page exists.
    async fn resolve_homepage_id(&self, space_id: &SpaceId) -> Result<PageId, ApiError>;

    /// Immediate children of a page, one level only. Empty for leaves.
    async fn list_children(&self, page_id: &PageId) -> Result<Vec<(PageId, String)>, ApiError>;

    /// Title of a single page.
    async fn get_title(&self, page_id: &PageId) -> Result<String, ApiError>;

    /// Whether the page's export view is the empty-paragraph marker or blank.
    async fn is_empty(&self, page_id: &PageId) -> Result<bool, ApiError>;

    /// Trigger a PDF export and resolve the presigned download URL.
    ///
    /// Returns `None` when the export markup did not carry a task/cloud id
    /// pair; the caller must treat that as a failed attempt, not an error.
    async fn initiate_pdf_export(&self, page_id: &PageId) -> Result<Option<String>, ApiError>;

    /// Download the rendered PDF from a presigned URL.
    ///
    /// Returns `None` on any non-2xx status (typically a 404 because the
    /// export job has not settled yet), so the orchestrator can retry.
    async fn fetch_export_pdf(&self, presigned_url: &str) -> Result<Option<Bytes>, ApiError>;
}

/// Cloud object-storage bucket bound at construction time.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Delete every object in the bucket. Idempotent: succeeds on an already
    /// empty bucket. Any failure propagates; nothing is swallowed.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Store a fully buffered payload under `key` as one atomic put. The
    /// object either appears complete or not at all.
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StoreError>;
}
