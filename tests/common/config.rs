//! Test configuration helpers for building acquirers against the mock server

use super::fixtures::MockGbif;
use specimen_dl::{Acquirer, Config, EventReporter, GbifClient, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Configuration rooted in `temp_dir` talking to `gbif`
///
/// Retries are disabled so every mocked response is observed exactly once.
pub fn test_config(temp_dir: &TempDir, gbif: &MockGbif) -> Config {
    let mut config = Config::rooted_at(temp_dir.path());
    config.api.base_url = gbif.base_url();
    config.download.probe_timeout = Duration::from_secs(2);
    config.download.transfer_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_attempts: 0,
        ..Default::default()
    };
    config
}

/// Build an acquirer plus the reporter it publishes to
pub fn create_acquirer(config: Config) -> (Acquirer, Arc<EventReporter>) {
    let api = Arc::new(GbifClient::new(&config.api).expect("GBIF client should build"));
    let reporter = Arc::new(EventReporter::default());
    let acquirer =
        Acquirer::new(config, api, reporter.clone()).expect("test configuration should be valid");
    (acquirer, reporter)
}
