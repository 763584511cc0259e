//! Streaming transfer and persistence

use super::{AssetDownloader, Outcome};
use crate::error::DownloadError;
use crate::retry::with_retry;
use crate::types::{OccurrenceKey, SavedAsset};
use futures::StreamExt;
use std::io::Write;
use std::path::Path;

/// Extension used when the URL path carries none
const DEFAULT_EXTENSION: &str = ".jpg";

/// Resolve the file extension for a media URL
///
/// Returns the extension (with leading dot) taken from the URL path, or
/// `.jpg` when the path has none. An extension outside `accepted` is returned
/// as the error value.
pub fn resolve_extension(url: &url::Url, accepted: &[String]) -> Result<String, String> {
    let extension = match Path::new(url.path()).extension() {
        None => return Ok(DEFAULT_EXTENSION.to_string()),
        Some(ext) => format!(".{}", ext.to_string_lossy()),
    };

    if accepted.iter().any(|a| *a == extension) {
        Ok(extension)
    } else {
        Err(extension)
    }
}

impl AssetDownloader {
    /// Download the media at `url` and save it as `<key><ext>`
    ///
    /// Exactly one file exists afterwards on success and none on any failure.
    /// Transient transport failures are retried according to the retry
    /// policy; the probe runs once.
    pub async fn download(&self, key: OccurrenceKey, url: &str) -> Outcome {
        let parsed = url::Url::parse(url).map_err(|source| DownloadError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        if !self.probe(url).await {
            return Err(DownloadError::Unreachable {
                url: url.to_string(),
            });
        }

        with_retry(&self.retry, || self.transfer(key, &parsed)).await
    }

    async fn transfer(&self, key: OccurrenceKey, url: &url::Url) -> Outcome {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.transfer_timeout)
            .send()
            .await
            .map_err(|source| DownloadError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Checked before the body is read so rejected types cost no bandwidth
        let extension = resolve_extension(url, &self.accepted_extensions).map_err(|extension| {
            DownloadError::RejectedExtension {
                url: url.to_string(),
                extension,
            }
        })?;

        let path = self.output_dir.join(format!("{}{}", key, extension));
        let persist_err = |source: std::io::Error| DownloadError::Persist {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(persist_err)?;

        // Partial bodies live in a hidden temp file that is removed on drop,
        // including when the surrounding future is cancelled
        let mut staging = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".tmp")
            .tempfile_in(&self.output_dir)
            .map_err(persist_err)?;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| DownloadError::Transport {
                url: url.to_string(),
                source,
            })?;
            staging.write_all(&chunk).map_err(persist_err)?;
        }
        staging.flush().map_err(persist_err)?;

        staging.persist(&path).map_err(|e| persist_err(e.error))?;

        tracing::debug!(record_key = %key, path = ?path, "image saved");

        Ok(SavedAsset {
            key,
            path,
            extension,
            status: status.as_u16(),
        })
    }
}
