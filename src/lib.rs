//! Export a Confluence space as a PDF snapshot in a bucket.
//!
//! This crate downloads every page of a Confluence wiki space as PDF and
//! uploads the files to an object-storage bucket (or a local directory when
//! no bucket is configured). The destination bucket is emptied first, so a
//! completed run is a consistent snapshot of the space.
//!
//! Pipeline: clear the bucket, resolve the space and its homepage, discover
//! the page tree, export each page with bounded retry, aggregate a report.
//!
//! The remote API and the bucket sit behind the traits in [`contract`], so
//! every stage can be tested against deterministic mocks.

pub mod bucket;
pub mod cli;
pub mod config;
pub mod confluence;
pub mod contract;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod tree;

pub use cli::{run, Cli, Commands};
