//! Error taxonomy for the export pipeline.
//!
//! Split by the stage that can fail: configuration loading, remote Confluence
//! calls, object-storage operations, and the pipeline union of all three.
//! Per-page export/download failures are absorbed into a `DOWNLOAD_FAILED`
//! outcome by the orchestrator and never surface as errors; everything here is
//! either fatal pre-flight or fatal for the whole run.

use thiserror::Error;

/// A required setting is missing or cannot be parsed. Raised before any
/// remote call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Failure of a single Confluence REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials were rejected (401/403). Unrecoverable: retrying with the
    /// same token cannot succeed, so this aborts the run.
    #[error("Confluence rejected the credentials (status {status})")]
    Auth { status: u16 },

    /// Any other non-2xx response, with the body kept for diagnostics.
    #[error("Confluence request failed with status {status}: {body}")]
    Remote { status: u16, body: String },

    /// The response decoded, but did not have the shape we expect.
    #[error("could not decode Confluence response: {0}")]
    Parse(String),

    /// Connection-level failure (DNS, TLS, timeout, ...).
    #[error("transport error talking to Confluence: {0}")]
    Transport(#[from] reqwest::Error),

    /// The space has no parentless page to act as traversal root.
    #[error("space has no homepage (no page without a parent)")]
    HomepageNotFound,
}

impl ApiError {
    /// Auth failures abort the run even inside the per-page retry loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }
}

/// Failure of a bucket operation. Fatal when clearing the bucket; inside a
/// page's attempt loop an upload failure just consumes one retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("object store configuration error: {0}")]
    Config(String),
}

/// Fatal failure of a whole space-export run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not clean bucket: {0}")]
    Store(#[from] StoreError),

    #[error("Confluence space download failed: {0}")]
    Api(#[from] ApiError),
}
