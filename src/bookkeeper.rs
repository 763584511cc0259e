//! Acquisition bookkeeping
//!
//! The [`Bookkeeper`] owns the mutable state of one acquisition: accepted
//! assets (and with them the license ledger), the outcome histogram and the
//! explicit-license counter. All of it sits behind a single mutex so that
//! recording a success and checking the target happen atomically, even when
//! several transfers finish at once.

use crate::config::LedgerConfig;
use crate::downloader::{Outcome, outcome_status};
use crate::error::Result;
use crate::ledger::{self, LicenseLedger, Statistics};
use crate::types::{AcceptedAsset, MediaRef, OccurrenceKey};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Histogram bucket for outcomes that never produced a status
pub const NO_STATUS: &str = "none";

/// State accumulated during one acquisition
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AcquisitionState {
    /// Accepted assets by record key
    pub accepted: BTreeMap<OccurrenceKey, AcceptedAsset>,
    /// Outcome counts keyed by HTTP status or [`NO_STATUS`]
    pub status_histogram: BTreeMap<String, u64>,
    /// Accepted records carrying explicit licensing metadata
    pub explicit_license_count: u64,
}

impl AcquisitionState {
    /// Number of distinct accepted records
    pub fn success_count(&self) -> usize {
        self.accepted.len()
    }

    /// Accepted record keys
    pub fn accepted_ids(&self) -> BTreeSet<OccurrenceKey> {
        self.accepted.keys().copied().collect()
    }

    /// License string per accepted record
    pub fn license_ledger(&self) -> LicenseLedger {
        self.accepted
            .iter()
            .map(|(key, asset)| (*key, asset.license.clone()))
            .collect()
    }
}

/// What [`Bookkeeper::consider`] did with an outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consideration {
    /// A new record was accepted
    Accepted {
        /// Accepted total after this record
        accepted: usize,
        /// This record brought the total to the requested count
        reached_target: bool,
    },
    /// The record was already accepted; nothing changed
    Duplicate,
    /// The transfer failed; only statistics changed
    Failed,
}

/// Tracks accepted assets against a requested count
#[derive(Debug)]
pub struct Bookkeeper {
    requested: usize,
    collect_statistics: bool,
    state: Mutex<AcquisitionState>,
}

impl Bookkeeper {
    /// Start with empty state
    pub fn new(requested: usize, collect_statistics: bool) -> Self {
        Self {
            requested,
            collect_statistics,
            state: Mutex::new(AcquisitionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AcquisitionState> {
        // State stays consistent across a panicking holder: every update is a single insert
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Requested number of assets
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Record a download outcome for a filtered record
    pub fn consider(&self, candidate: &MediaRef, outcome: &Outcome) -> Consideration {
        let mut state = self.lock();

        if self.collect_statistics {
            let bucket = outcome_status(outcome)
                .map(|s| s.to_string())
                .unwrap_or_else(|| NO_STATUS.to_string());
            *state.status_histogram.entry(bucket).or_insert(0) += 1;
        }

        let saved = match outcome {
            Ok(saved) => saved,
            Err(_) => return Consideration::Failed,
        };

        if state.accepted.contains_key(&candidate.key) {
            return Consideration::Duplicate;
        }

        let before = state.accepted.len();
        state.accepted.insert(
            candidate.key,
            AcceptedAsset {
                key: candidate.key,
                license: candidate.license.clone(),
                path: saved.path.clone(),
                extension: saved.extension.clone(),
            },
        );
        if self.collect_statistics && candidate.has_explicit_license() {
            state.explicit_license_count += 1;
        }

        let accepted = state.accepted.len();
        Consideration::Accepted {
            accepted,
            reached_target: before < self.requested && accepted >= self.requested,
        }
    }

    /// Whether `key` has already been accepted
    pub fn is_accepted(&self, key: OccurrenceKey) -> bool {
        self.lock().accepted.contains_key(&key)
    }

    /// True once the accepted count reaches the requested count
    pub fn is_satisfied(&self) -> bool {
        self.lock().accepted.len() >= self.requested
    }

    /// Number of distinct accepted records
    pub fn success_count(&self) -> usize {
        self.lock().success_count()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> AcquisitionState {
        self.lock().clone()
    }

    /// Persist the license ledger, the identifier ledger and, when enabled,
    /// the statistics artifact
    ///
    /// Licenses are merged into the existing ledger so that images kept from
    /// earlier runs keep their entries; the reconciler drops the ones whose
    /// file is gone.
    pub async fn flush(&self, config: &LedgerConfig) -> Result<()> {
        let state = self.snapshot();

        let mut licenses = ledger::read_licenses(&config.licenses_path).await?;
        licenses.extend(state.license_ledger());
        ledger::write_licenses(&config.licenses_path, &licenses).await?;
        ledger::write_ids(&config.ids_path, &state.accepted_ids()).await?;

        if self.collect_statistics {
            let statistics = Statistics {
                accepted: state.success_count(),
                explicit_license_count: state.explicit_license_count,
                status_histogram: state.status_histogram.clone(),
                generated_at: chrono::Utc::now(),
            };
            ledger::write_statistics(&config.statistics_path, &statistics).await?;
        }

        tracing::debug!(
            accepted = state.success_count(),
            ids_path = ?config.ids_path,
            "ledgers flushed"
        );
        Ok(())
    }
}
