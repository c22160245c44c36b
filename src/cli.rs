//! CLI glue for the space exporter.
//!
//! All business logic lives in the library modules; this module only parses
//! arguments, loads configuration, wires up the real client and store, and
//! prints the response envelope. [`run`] is the async entrypoint shared by
//! `main` and the CLI integration tests.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::bucket::ObjectBucketStore;
use crate::config::Config;
use crate::confluence::RestConfluenceClient;
use crate::export::ExportDestination;
use crate::pipeline::{export_space, CancelFlag, ExportResponse};

/// CLI for exporting a Confluence space as a PDF snapshot.
#[derive(Parser)]
#[clap(
    name = "confluence-space-export",
    version,
    about = "Clear the destination bucket and download every page of a Confluence space as PDF"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the configured space (configuration comes from the environment)
    ExportSpace,
}

/// Run the parsed CLI. Prints the `{status, msg, data}` envelope to stdout
/// and returns an error (non-zero exit) when the run failed fatally.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::ExportSpace => {
            let response = export_space_from_env().await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.status < 0 {
                anyhow::bail!("{}", response.msg);
            }
            Ok(())
        }
    }
}

async fn export_space_from_env() -> ExportResponse {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Could not load configuration");
            return ExportResponse::failure("Could not load environment variables", e);
        }
    };
    config.trace_loaded();

    let destination = match &config.bucket_name {
        Some(bucket) => match ObjectBucketStore::from_env(bucket) {
            Ok(store) => ExportDestination::Bucket(Arc::new(store)),
            Err(e) => {
                error!(error = %e, bucket = %bucket, "Could not connect to bucket");
                return ExportResponse::failure("Could not clean bucket", e);
            }
        },
        None => {
            info!(output_dir = %config.output_dir.display(), "No bucket configured, writing locally");
            ExportDestination::LocalDir(config.output_dir.clone())
        }
    };

    let api = RestConfluenceClient::new(config.credentials.clone());
    match export_space(&api, &destination, &config, &CancelFlag::new()).await {
        Ok(report) => ExportResponse::success(&report),
        Err(e) => {
            error!(error = %e, "Space export failed");
            ExportResponse::failure("Confluence space download failed", e)
        }
    }
}
