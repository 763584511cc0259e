//! Validity probe

use super::AssetDownloader;

impl AssetDownloader {
    /// Cheap reachability check before a full transfer
    ///
    /// Issues a HEAD request bounded by the probe timeout. Any transport
    /// failure yields `false`; any answer at all, whatever its status, yields
    /// `true`. A passing probe does not guarantee the transfer succeeds.
    pub async fn probe(&self, url: &str) -> bool {
        match self
            .http
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "probe failed");
                false
            }
        }
    }
}
