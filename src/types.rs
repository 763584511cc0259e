//! Core types for specimen-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable identifier of an occurrence record (GBIF `key`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceKey(pub i64);

impl OccurrenceKey {
    /// Create a new OccurrenceKey
    pub fn new(key: i64) -> Self {
        Self(key)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for OccurrenceKey {
    fn from(key: i64) -> Self {
        Self(key)
    }
}

impl std::fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OccurrenceKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// One media attachment of an occurrence record
///
/// Every field is optional: publishers routinely ship metadata-only media
/// entries without a format or locator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Media type as reported by GBIF (e.g., "StillImage")
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    /// MIME-like format (e.g., "image/jpeg")
    #[serde(default)]
    pub format: Option<String>,
    /// Resource locator
    #[serde(default)]
    pub identifier: Option<String>,
    /// Free-text rights statement
    #[serde(default)]
    pub rights: Option<String>,
    /// Media-level license
    #[serde(default)]
    pub license: Option<String>,
    /// Rights holder
    #[serde(default)]
    pub rights_holder: Option<String>,
}

/// Occurrence record as returned by the occurrence search endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceRecord {
    /// Stable record identifier
    pub key: OccurrenceKey,
    /// Scientific name as interpreted by GBIF
    #[serde(default)]
    pub scientific_name: Option<String>,
    /// Publishing organization key
    #[serde(default, rename = "publishingOrgKey", alias = "publishingOrg")]
    pub publishing_org: Option<String>,
    /// Record-level license (may be empty)
    #[serde(default)]
    pub license: Option<String>,
    /// Media attachments, in publisher order
    #[serde(default)]
    pub media: Option<Vec<MediaItem>>,
}

/// One page of occurrence search results
///
/// Results are kept as raw JSON so a single malformed record can be skipped
/// without discarding the rest of the page.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Offset this page was requested at
    #[serde(default)]
    pub offset: u64,
    /// Page size the server applied
    #[serde(default)]
    pub limit: u64,
    /// Whether the server considers this the last page
    #[serde(default)]
    pub end_of_records: bool,
    /// Total number of matching records, if reported
    #[serde(default)]
    pub count: Option<u64>,
    /// Raw records
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// One entry of the species name search
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameMatch {
    /// Species-rank canonical name
    #[serde(default)]
    pub species: Option<String>,
    /// Canonical name without authorship
    #[serde(default)]
    pub canonical_name: Option<String>,
    /// Full scientific name with authorship
    #[serde(default)]
    pub scientific_name: Option<String>,
}

/// Response of the species name search
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NameLookup {
    /// Number of matches
    #[serde(default)]
    pub count: u64,
    /// Matches, best first
    #[serde(default)]
    pub results: Vec<NameMatch>,
}

impl NameLookup {
    /// Canonical name of the best match that carries one
    ///
    /// Prefers the species-rank name and falls back to the canonical name.
    pub fn canonical_name(&self) -> Option<&str> {
        self.results.iter().find_map(|m| {
            m.species
                .as_deref()
                .or(m.canonical_name.as_deref())
                .filter(|name| !name.trim().is_empty())
        })
    }
}

/// A record that passed the filter, with its first media item
#[derive(Clone, Debug, PartialEq)]
pub struct MediaRef {
    /// Record identifier
    pub key: OccurrenceKey,
    /// Media locator to download
    pub url: String,
    /// Record-level license, empty if absent
    pub license: String,
    /// The authoritative media item
    pub media: MediaItem,
}

impl MediaRef {
    /// Whether the record carries licensing metadata of its own
    ///
    /// A non-empty record license counts, falling back to a non-empty
    /// rights statement on the media item.
    pub fn has_explicit_license(&self) -> bool {
        if !self.license.trim().is_empty() {
            return true;
        }
        self.media
            .rights
            .as_deref()
            .is_some_and(|rights| !rights.trim().is_empty())
    }
}

/// An image persisted by the downloader
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedAsset {
    /// Record identifier
    pub key: OccurrenceKey,
    /// Final path on disk
    pub path: PathBuf,
    /// Extension used for the file name, with leading dot
    pub extension: String,
    /// HTTP status of the transfer
    pub status: u16,
}

/// An asset the bookkeeper has accepted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedAsset {
    /// Record identifier
    pub key: OccurrenceKey,
    /// License string recorded for the record
    pub license: String,
    /// Path of the persisted file
    pub path: PathBuf,
    /// Extension, with leading dot
    pub extension: String,
}

/// Acquisition progress events
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// The raw scientific name resolved to a canonical one
    NameResolved {
        /// Name supplied by the caller
        raw: String,
        /// Canonical name used for searching
        canonical: String,
    },

    /// A page of occurrence records was fetched
    PageFetched {
        /// Offset requested
        offset: u64,
        /// Page size requested
        limit: u64,
        /// Number of records returned
        records: usize,
    },

    /// An image was saved and accepted
    AssetSaved {
        /// Record identifier
        key: OccurrenceKey,
        /// Accepted so far
        accepted: usize,
        /// Requested total
        requested: usize,
    },

    /// A transfer failed or was rejected
    AssetFailed {
        /// Record identifier
        key: OccurrenceKey,
        /// Observed HTTP status, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        /// Failure description
        error: String,
    },

    /// The requested number of images was reached
    TargetReached {
        /// Accepted total
        accepted: usize,
    },

    /// Upstream ran out of records before the target was reached
    InsufficientResults {
        /// Accepted total
        accepted: usize,
        /// Requested total
        requested: usize,
    },

    /// The reconciler removed surplus files
    Pruned {
        /// Identifiers whose files were removed
        removed: Vec<OccurrenceKey>,
    },

    /// Free-form warning
    Warning {
        /// Warning text
        message: String,
    },
}

/// Result of one acquisition run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    /// Name as supplied by the caller
    pub requested_name: String,
    /// Canonical name used for searching
    pub canonical_name: String,
    /// Requested number of images
    pub requested: usize,
    /// Distinct records accepted during acquisition (before pruning)
    pub accepted_total: usize,
    /// Images retained after reconciliation
    pub retained: usize,
    /// Identifiers removed by the reconciler
    pub pruned: Vec<OccurrenceKey>,
    /// Upstream ran out of records before the target was met
    pub exhausted: bool,
    /// Number of search pages requested
    pub pages_fetched: u64,
    /// Acquisition start time
    pub started_at: DateTime<Utc>,
    /// Acquisition end time (after reconciliation)
    pub finished_at: DateTime<Utc>,
}

impl AcquisitionSummary {
    /// Whether fewer images than requested were retained
    pub fn is_partial(&self) -> bool {
        self.retained < self.requested
    }
}
