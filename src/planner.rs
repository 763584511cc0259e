//! Query planning and the paginated acquisition loop
//!
//! The paginator requests occurrence pages at increasing offsets, filters
//! each record, downloads the survivors and hands every outcome to the
//! [`Bookkeeper`]. It stops as soon as the bookkeeper is satisfied or
//! upstream returns an empty page.

use crate::bookkeeper::{Bookkeeper, Consideration};
use crate::config::FilterConfig;
use crate::downloader::{AssetDownloader, outcome_status};
use crate::error::{DownloadError, Error, Result};
use crate::filter;
use crate::gbif::OccurrenceApi;
use crate::progress::Reporter;
use crate::types::{Event, MediaRef, OccurrenceRecord};
use futures::StreamExt;
use std::collections::{BTreeMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Smallest page ever requested
pub const MIN_PAGE_SIZE: u64 = 50;

/// Largest page ever requested
pub const MAX_PAGE_SIZE: u64 = 300;

/// Page size for a requested image count
///
/// Twice the request, kept within [`MIN_PAGE_SIZE`, `MAX_PAGE_SIZE`].
pub fn page_size(requested: usize) -> u64 {
    let wanted = (requested as u64).saturating_mul(2);
    wanted.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Query parameters for one occurrence page
///
/// `extra` is merged over the built-in filters (last write wins per key);
/// `limit` and `offset` are applied after it and cannot be overridden.
pub fn search_params(
    scientific_name: &str,
    limit: u64,
    offset: u64,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("mediaType".to_string(), "StillImage".to_string());
    params.insert(
        "basisOfRecord".to_string(),
        "PRESERVED_SPECIMEN".to_string(),
    );
    params.insert("scientificName".to_string(), scientific_name.to_string());
    for (key, value) in extra {
        params.insert(key.clone(), value.clone());
    }
    params.insert("limit".to_string(), limit.to_string());
    params.insert("offset".to_string(), offset.to_string());
    params
}

/// Resolve a raw scientific name to the canonical name used for searching
///
/// # Errors
///
/// [`Error::NameNotResolved`] when the lookup has no match carrying a name.
pub async fn resolve_name(api: &dyn OccurrenceApi, raw: &str) -> Result<String> {
    let lookup = api.lookup_name(raw).await?;
    if lookup.count == 0 {
        return Err(Error::NameNotResolved {
            name: raw.to_string(),
        });
    }
    lookup
        .canonical_name()
        .map(str::to_string)
        .ok_or_else(|| Error::NameNotResolved {
            name: raw.to_string(),
        })
}

/// How the paginated loop ended
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Search pages requested
    pub pages_fetched: u64,
    /// Upstream returned an empty page before the target was met
    pub exhausted: bool,
}

/// Drives the search → filter → download → bookkeeping loop
pub struct Paginator<'a> {
    /// Upstream record provider
    pub api: &'a dyn OccurrenceApi,
    /// Image downloader
    pub downloader: &'a AssetDownloader,
    /// Acquisition state
    pub bookkeeper: &'a Bookkeeper,
    /// Record filter policy
    pub filter: &'a FilterConfig,
    /// Supplementary search parameters
    pub extra_params: &'a BTreeMap<String, String>,
    /// Concurrent transfers within one page
    pub max_concurrent: usize,
    /// Progress sink
    pub reporter: &'a dyn Reporter,
}

impl Paginator<'_> {
    /// Run until the bookkeeper is satisfied or upstream is exhausted
    ///
    /// # Errors
    ///
    /// Only a failed page search aborts the loop; record and transfer
    /// failures are absorbed.
    pub async fn run(&self, scientific_name: &str) -> Result<PlanOutcome> {
        let requested = self.bookkeeper.requested();
        let limit = page_size(requested);
        let mut outcome = PlanOutcome::default();

        while !self.bookkeeper.is_satisfied() {
            let offset = outcome.pages_fetched * limit;
            let params = search_params(scientific_name, limit, offset, self.extra_params);
            let page = self.api.search(&params).await?;
            outcome.pages_fetched += 1;

            self.reporter.report_progress(&Event::PageFetched {
                offset,
                limit,
                records: page.results.len(),
            });

            if page.results.is_empty() {
                let accepted = self.bookkeeper.success_count();
                outcome.exhausted = true;
                self.reporter.report_progress(&Event::InsufficientResults {
                    accepted,
                    requested,
                });
                self.reporter.report_warning(&format!(
                    "only {} of {} requested images are available for {}",
                    accepted, requested, scientific_name
                ));
                break;
            }

            let candidates = self.candidates(page.results);
            debug!(offset, candidates = candidates.len(), "page filtered");
            self.download_all(candidates).await;
        }

        info!(
            pages = outcome.pages_fetched,
            accepted = self.bookkeeper.success_count(),
            exhausted = outcome.exhausted,
            "acquisition loop finished"
        );
        Ok(outcome)
    }

    /// Decode and filter one page, dropping records already accepted or
    /// repeated within the page
    fn candidates(&self, raw_records: Vec<serde_json::Value>) -> Vec<MediaRef> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for raw in raw_records {
            let record: OccurrenceRecord = match serde_json::from_value(raw) {
                Ok(record) => record,
                Err(e) => {
                    debug!(error = %e, "skipping malformed record");
                    continue;
                }
            };
            let media_ref = match filter::accept(&record, self.filter) {
                Ok(media_ref) => media_ref,
                Err(rejection) => {
                    debug!(record_key = %record.key, reason = %rejection, "record skipped");
                    continue;
                }
            };
            if self.bookkeeper.is_accepted(media_ref.key) || !seen.insert(media_ref.key) {
                debug!(record_key = %media_ref.key, "duplicate record skipped");
                continue;
            }
            candidates.push(media_ref);
        }
        candidates
    }

    /// Download candidates on a bounded pool, cancelling outstanding
    /// transfers once the target is reached
    async fn download_all(&self, candidates: Vec<MediaRef>) {
        let token = CancellationToken::new();
        let downloader = self.downloader;
        let bookkeeper = self.bookkeeper;
        let reporter = self.reporter;

        futures::stream::iter(candidates)
            .map(|candidate| {
                let token = token.clone();
                async move {
                    if token.is_cancelled() || bookkeeper.is_satisfied() {
                        return;
                    }

                    // The transfer branch is polled first so a file that was
                    // already persisted is always recorded
                    let outcome = tokio::select! {
                        biased;
                        outcome = downloader.download(candidate.key, &candidate.url) => outcome,
                        _ = token.cancelled() => Err(DownloadError::Cancelled),
                    };
                    if matches!(outcome, Err(DownloadError::Cancelled)) {
                        debug!(record_key = %candidate.key, "transfer cancelled");
                        return;
                    }

                    match bookkeeper.consider(&candidate, &outcome) {
                        Consideration::Accepted {
                            accepted,
                            reached_target,
                        } => {
                            reporter.report_progress(&Event::AssetSaved {
                                key: candidate.key,
                                accepted,
                                requested: bookkeeper.requested(),
                            });
                            if reached_target {
                                reporter.report_progress(&Event::TargetReached { accepted });
                                token.cancel();
                            }
                        }
                        Consideration::Duplicate => {
                            debug!(record_key = %candidate.key, "record already accepted");
                        }
                        Consideration::Failed => {
                            let error = match &outcome {
                                Err(e) => e.to_string(),
                                Ok(_) => String::new(),
                            };
                            reporter.report_progress(&Event::AssetFailed {
                                key: candidate.key,
                                status: outcome_status(&outcome),
                                error,
                            });
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent.max(1))
            .collect::<Vec<()>>()
            .await;
    }
}
