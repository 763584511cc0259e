//! Image transfer: validity probe, streaming download, extension gate and
//! atomic persistence.
//!
//! - [`probe`] - HEAD request before committing to a transfer
//! - [`transfer`] - streaming GET and on-disk persistence

mod probe;
mod transfer;


pub use transfer::resolve_extension;

use crate::config::{Config, RetryConfig};
use crate::error::{DownloadError, Result};
use crate::types::SavedAsset;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of one download attempt
pub type Outcome = std::result::Result<SavedAsset, DownloadError>;

/// HTTP status observed for an outcome, if any
///
/// Successful saves report their transfer status; failures report the status
/// only when the server answered with a non-success code.
pub fn outcome_status(outcome: &Outcome) -> Option<u16> {
    match outcome {
        Ok(asset) => Some(asset.status),
        Err(e) => e.status(),
    }
}

/// Downloads media into the output directory
#[derive(Clone, Debug)]
pub struct AssetDownloader {
    pub(crate) http: reqwest::Client,
    pub(crate) output_dir: PathBuf,
    pub(crate) probe_timeout: Duration,
    pub(crate) transfer_timeout: Duration,
    pub(crate) accepted_extensions: Vec<String>,
    pub(crate) retry: RetryConfig,
}

impl AssetDownloader {
    /// Build a downloader from the download and retry settings
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.api.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            output_dir: config.download.output_dir.clone(),
            probe_timeout: config.download.probe_timeout,
            transfer_timeout: config.download.transfer_timeout,
            accepted_extensions: config.download.accepted_extensions.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Directory images are written to
    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }
}
