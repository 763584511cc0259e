//! Acquisition orchestration
//!
//! [`Acquirer`] wires the pieces together for one taxon: resolve the name,
//! page through occurrence records while downloading images, flush the
//! ledgers and prune the output directory back to the requested size.

use crate::bookkeeper::Bookkeeper;
use crate::config::Config;
use crate::downloader::AssetDownloader;
use crate::error::{Error, Result};
use crate::gbif::{GbifClient, OccurrenceApi};
use crate::planner::{self, Paginator};
use crate::progress::{SharedReporter, TracingReporter};
use crate::reconciler;
use crate::types::{AcquisitionSummary, Event};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Acquires specimen images for a taxon
///
/// # Example
///
/// ```no_run
/// use specimen_dl::{Acquirer, Config};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let acquirer = Acquirer::with_gbif(Config::rooted_at("data"))?;
///     let summary = acquirer.acquire("Quercus robur", 25).await?;
///     println!("{} of {} images", summary.retained, summary.requested);
///     Ok(())
/// }
/// ```
pub struct Acquirer {
    config: Arc<Config>,
    api: Arc<dyn OccurrenceApi>,
    downloader: AssetDownloader,
    reporter: SharedReporter,
}

impl Acquirer {
    /// Create an acquirer over an arbitrary record provider
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: Config, api: Arc<dyn OccurrenceApi>, reporter: SharedReporter) -> Result<Self> {
        config.validate()?;
        let downloader = AssetDownloader::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            api,
            downloader,
            reporter,
        })
    }

    /// Create an acquirer talking to the configured GBIF endpoint and
    /// reporting through `tracing`
    pub fn with_gbif(config: Config) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(GbifClient::new(&config.api)?);
        Self::new(config, api, Arc::new(TracingReporter))
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Acquire `requested` images for the raw scientific name `name`
    ///
    /// Falling short of the target is not an error: the summary reports
    /// what was retained and [`AcquisitionSummary::exhausted`] is set.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when `requested` is zero
    /// - [`Error::NameNotResolved`] when the name has no taxonomic match
    /// - upstream search failures and ledger or filesystem I/O failures
    pub async fn acquire(&self, name: &str, requested: usize) -> Result<AcquisitionSummary> {
        if requested == 0 {
            return Err(Error::config("requested", "must request at least one image"));
        }
        let started_at = Utc::now();

        let canonical_name = planner::resolve_name(self.api.as_ref(), name).await?;
        self.reporter.report_progress(&Event::NameResolved {
            raw: name.to_string(),
            canonical: canonical_name.clone(),
        });

        let bookkeeper = Bookkeeper::new(requested, self.config.ledger.collect_statistics);
        let paginator = Paginator {
            api: self.api.as_ref(),
            downloader: &self.downloader,
            bookkeeper: &bookkeeper,
            filter: &self.config.filter,
            extra_params: &self.config.api.extra_params,
            max_concurrent: self.config.download.max_concurrent_downloads,
            reporter: self.reporter.as_ref(),
        };
        let plan = paginator.run(&canonical_name).await;

        // Images saved before a failed page search still get ledger entries
        bookkeeper.flush(&self.config.ledger).await?;
        let accepted_total = bookkeeper.success_count();

        let report = reconciler::reconcile(
            requested,
            &self.config.download.output_dir,
            &self.config.download.accepted_extensions,
            &self.config.ledger,
        )
        .await?;

        let plan = plan.inspect_err(|e| {
            warn!(
                error = %e,
                accepted = accepted_total,
                retained = report.retained.len(),
                "page search failed, ledgers written for images saved so far"
            );
            self.reporter.report_warning(&format!(
                "search stopped early ({}); {} images kept",
                e,
                report.retained.len()
            ));
        })?;

        if !report.removed.is_empty() {
            self.reporter.report_progress(&Event::Pruned {
                removed: report.removed.clone(),
            });
        }
        if !report.adopted.is_empty() || !report.dropped.is_empty() {
            self.reporter.report_warning(&format!(
                "identifier ledger resynchronised with output directory ({} adopted, {} dropped)",
                report.adopted.len(),
                report.dropped.len()
            ));
        }

        let summary = AcquisitionSummary {
            requested_name: name.to_string(),
            canonical_name,
            requested,
            accepted_total,
            retained: report.retained.len(),
            pruned: report.removed,
            exhausted: plan.exhausted,
            pages_fetched: plan.pages_fetched,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            name = %summary.canonical_name,
            requested,
            accepted = summary.accepted_total,
            retained = summary.retained,
            pruned = summary.pruned.len(),
            exhausted = summary.exhausted,
            "acquisition complete"
        );
        Ok(summary)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::EventReporter;
    use crate::types::{NameLookup, NameMatch, SearchPage};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Provider that resolves every name and serves no records
    #[derive(Default)]
    struct EmptyApi {
        searches: Mutex<Vec<BTreeMap<String, String>>>,
    }

    #[async_trait]
    impl OccurrenceApi for EmptyApi {
        async fn search(&self, params: &BTreeMap<String, String>) -> Result<SearchPage> {
            self.searches.lock().unwrap().push(params.clone());
            Ok(SearchPage::default())
        }

        async fn lookup_name(&self, _raw: &str) -> Result<NameLookup> {
            Ok(NameLookup {
                count: 1,
                results: vec![NameMatch {
                    species: Some("Quercus robur".to_string()),
                    ..Default::default()
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_zero_requested_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let acquirer = Acquirer::new(
            Config::rooted_at(temp_dir.path()),
            Arc::new(EmptyApi::default()),
            Arc::new(TracingReporter),
        )
        .unwrap();

        let result = acquirer.acquire("Quercus robur", 0).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::rooted_at(temp_dir.path());
        config.download.max_concurrent_downloads = 0;

        let result = Acquirer::new(config, Arc::new(EmptyApi::default()), Arc::new(TracingReporter));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_exhausted_run_returns_partial_summary() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::rooted_at(temp_dir.path());
        let ids_path = config.ledger.ids_path.clone();
        let api = Arc::new(EmptyApi::default());
        let reporter = Arc::new(EventReporter::default());
        let mut events = reporter.subscribe();

        let acquirer = Acquirer::new(config, api.clone(), reporter).unwrap();
        let summary = acquirer.acquire("quercus robur", 5).await.unwrap();

        assert_eq!(summary.canonical_name, "Quercus robur");
        assert_eq!(summary.retained, 0);
        assert!(summary.exhausted);
        assert!(summary.is_partial());
        assert_eq!(summary.pages_fetched, 1);
        assert_eq!(std::fs::read_to_string(ids_path).unwrap(), "");

        let searches = api.searches.lock().unwrap();
        assert_eq!(searches[0]["scientificName"], "Quercus robur");
        assert_eq!(searches[0]["limit"], "50");

        let mut saw_insufficient = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, Event::InsufficientResults { accepted: 0, requested: 5 }) {
                saw_insufficient = true;
            }
        }
        assert!(saw_insufficient);
    }
}
