//! Ledger and statistics artifacts
//!
//! - identifier ledger: one record key per line, sorted
//! - license ledger: JSON object mapping record key to license string
//! - statistics: JSON document for the external report renderer
//!
//! Every write goes to a sibling temp file first and is renamed into place,
//! so readers never observe a half-written ledger.

use crate::error::{Error, Result};
use crate::types::OccurrenceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// License ledger contents
pub type LicenseLedger = BTreeMap<OccurrenceKey, String>;

/// Outcome statistics collected during an acquisition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Distinct records accepted
    pub accepted: usize,
    /// Accepted records with explicit licensing metadata
    pub explicit_license_count: u64,
    /// Transfer outcomes keyed by HTTP status, `"none"` when no status was observed
    pub status_histogram: BTreeMap<String, u64>,
    /// When the artifact was written
    pub generated_at: DateTime<Utc>,
}

/// Read the identifier ledger
///
/// Blank lines are ignored; any other line must be a record key.
pub async fn read_ids(path: &Path) -> Result<BTreeSet<OccurrenceKey>> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_ids(path, &content)
}

fn parse_ids(path: &Path, content: &str) -> Result<BTreeSet<OccurrenceKey>> {
    let mut ids = BTreeSet::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let key = line.parse().map_err(|e| Error::MalformedLedger {
            path: path.to_path_buf(),
            line: index + 1,
            reason: format!("'{}' is not a record key: {}", line, e),
        })?;
        ids.insert(key);
    }
    Ok(ids)
}

/// Write the identifier ledger, replacing any previous contents
pub async fn write_ids(path: &Path, ids: &BTreeSet<OccurrenceKey>) -> Result<()> {
    let mut content = String::new();
    for id in ids {
        content.push_str(&id.to_string());
        content.push('\n');
    }
    write_atomic(path, content.as_bytes()).await
}

/// Read the license ledger; a missing file is an empty ledger
pub async fn read_licenses(path: &Path) -> Result<LicenseLedger> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LicenseLedger::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write the license ledger, replacing any previous contents
pub async fn write_licenses(path: &Path, licenses: &LicenseLedger) -> Result<()> {
    let payload = serde_json::to_vec_pretty(licenses)?;
    write_atomic(path, &payload).await
}

/// Write the statistics artifact
pub async fn write_statistics(path: &Path, statistics: &Statistics) -> Result<()> {
    let payload = serde_json::to_vec_pretty(statistics)?;
    write_atomic(path, &payload).await
}

async fn write_atomic(path: &Path, payload: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = staging_path(path);
    tokio::fs::write(&tmp, payload).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
