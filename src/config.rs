//! Environment-driven configuration for a space export run.
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file by the binary). Loading fails fast with a descriptive
//! [`ConfigError`] before any remote call is made.

use std::env;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::contract::Credentials;
use crate::error::ConfigError;

/// Default directory for the filesystem fallback when no bucket is set.
pub const DEFAULT_OUTPUT_DIR: &str = "confluence_downloads";

/// Everything one export run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Key of the space to export, e.g. `OR`.
    pub space_key: String,
    /// Destination bucket. `None` switches to the filesystem fallback.
    pub bucket_name: Option<String>,
    /// Directory for the filesystem fallback.
    pub output_dir: PathBuf,
    /// Settling delay between requesting an export and downloading it.
    pub wait_seconds: u64,
}

impl Config {
    /// Load and validate all settings from the environment.
    ///
    /// Required: `CONFLUENCE_DOMAIN`, `CONFLUENCE_API_EMAIL`,
    /// `CONFLUENCE_API_TOKEN`, `CONFLUENCE_SPACE_KEY`,
    /// `WAIT_TIME_BEFORE_DOWNLOAD` (non-negative integer seconds).
    /// Optional: `EXPORT_BUCKET_NAME`, `EXPORT_OUTPUT_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let domain = required("CONFLUENCE_DOMAIN")?;
        let email = required("CONFLUENCE_API_EMAIL")?;
        let api_token = required("CONFLUENCE_API_TOKEN")?;
        let space_key = required("CONFLUENCE_SPACE_KEY")?;

        let wait_raw = required("WAIT_TIME_BEFORE_DOWNLOAD")?;
        let wait_seconds =
            wait_raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid {
                    name: "WAIT_TIME_BEFORE_DOWNLOAD",
                    value: wait_raw.clone(),
                    reason: format!("must be a non-negative integer number of seconds: {e}"),
                })?;

        let bucket_name = env::var("EXPORT_BUCKET_NAME").ok().filter(|b| !b.is_empty());
        let output_dir = env::var("EXPORT_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Ok(Config {
            credentials: Credentials {
                domain,
                email,
                api_token,
            },
            space_key,
            bucket_name,
            output_dir,
            wait_seconds,
        })
    }

    /// Log the loaded configuration. The API token is never logged.
    pub fn trace_loaded(&self) {
        info!(
            domain = %self.credentials.domain,
            email = %self.credentials.email,
            space_key = %self.space_key,
            bucket_name = self.bucket_name.as_deref().unwrap_or("<none, filesystem fallback>"),
            output_dir = %self.output_dir.display(),
            wait_seconds = self.wait_seconds,
            "Loaded export configuration"
        );
        debug!(config = ?self, "Configuration (full debug)");
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}
