//! Set reconciliation
//!
//! Runs once after acquisition and brings the output directory back to the
//! requested size. Surplus images are removed oldest first (by modification
//! time, ties broken by file name), and both ledgers are rewritten to match
//! the files that remain.

use crate::config::LedgerConfig;
use crate::error::Result;
use crate::ledger;
use crate::types::OccurrenceKey;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// What reconciliation changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Records whose image was removed to meet the target
    pub removed: Vec<OccurrenceKey>,
    /// Records retained on disk and in the identifier ledger
    pub retained: BTreeSet<OccurrenceKey>,
    /// Older files removed because a newer file exists for the same record
    pub superseded: Vec<PathBuf>,
    /// Retained files that were missing from the identifier ledger
    pub adopted: Vec<OccurrenceKey>,
    /// Ledger entries dropped because their file no longer exists
    pub dropped: Vec<OccurrenceKey>,
}

#[derive(Debug)]
struct ImageFile {
    key: OccurrenceKey,
    path: PathBuf,
    name: String,
    modified: SystemTime,
}

/// Prune `output_dir` to at most `target` images and rewrite the ledgers
///
/// Only files whose extension is in `extensions` and whose stem is a record
/// key take part; anything else in the directory is left alone.
pub async fn reconcile(
    target: usize,
    output_dir: &Path,
    extensions: &[String],
    ledger_config: &LedgerConfig,
) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    let mut images = list_images(output_dir, extensions).await?;
    images.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));

    // Keep only the newest file per record
    let mut newest: BTreeMap<OccurrenceKey, usize> = BTreeMap::new();
    for (index, image) in images.iter().enumerate() {
        newest.insert(image.key, index);
    }
    let mut current = Vec::with_capacity(newest.len());
    for (index, image) in images.into_iter().enumerate() {
        if newest.get(&image.key) == Some(&index) {
            current.push(image);
        } else {
            remove_image(&image.path).await?;
            debug!(path = ?image.path, "removed superseded image");
            report.superseded.push(image.path);
        }
    }

    let surplus = current.len().saturating_sub(target);
    for image in current.drain(..surplus) {
        remove_image(&image.path).await?;
        debug!(record_key = %image.key, path = ?image.path, "pruned image");
        report.removed.push(image.key);
    }

    report.retained = current.iter().map(|image| image.key).collect();

    let previous = match ledger::read_ids(&ledger_config.ids_path).await {
        Ok(ids) => ids,
        Err(crate::error::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            BTreeSet::new()
        }
        Err(e) => return Err(e),
    };
    let removed: BTreeSet<_> = report.removed.iter().copied().collect();
    report.adopted = report.retained.difference(&previous).copied().collect();
    report.dropped = previous
        .difference(&report.retained)
        .filter(|key| !removed.contains(key))
        .copied()
        .collect();

    if !report.adopted.is_empty() {
        warn!(
            count = report.adopted.len(),
            "images on disk were missing from the identifier ledger"
        );
    }
    if !report.dropped.is_empty() {
        warn!(
            count = report.dropped.len(),
            "identifier ledger listed images that are not on disk"
        );
    }

    ledger::write_ids(&ledger_config.ids_path, &report.retained).await?;

    let mut licenses = ledger::read_licenses(&ledger_config.licenses_path).await?;
    licenses.retain(|key, _| report.retained.contains(key));
    let mut unlicensed = 0usize;
    for key in &report.retained {
        licenses.entry(*key).or_insert_with(|| {
            unlicensed += 1;
            String::new()
        });
    }
    if unlicensed > 0 {
        warn!(
            count = unlicensed,
            "retained images had no license entry, recorded as unknown"
        );
    }
    ledger::write_licenses(&ledger_config.licenses_path, &licenses).await?;

    info!(
        target,
        retained = report.retained.len(),
        removed = report.removed.len(),
        "reconciled image set"
    );
    Ok(report)
}

/// Remove an image; a file that is already gone counts as removed
async fn remove_image(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = ?path, "image already removed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn list_images(dir: &Path, extensions: &[String]) -> Result<Vec<ImageFile>> {
    let mut images = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(images),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(key) = image_key(&path, extensions) else {
            continue;
        };
        images.push(ImageFile {
            key,
            name: entry.file_name().to_string_lossy().into_owned(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            path,
        });
    }
    Ok(images)
}

/// Record key of an image file, if the file is one of ours
fn image_key(path: &Path, extensions: &[String]) -> Option<OccurrenceKey> {
    let extension = path.extension()?.to_str()?;
    if !extensions.iter().any(|e| e.strip_prefix('.') == Some(extension)) {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DownloadConfig};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        output: PathBuf,
        ledger: LedgerConfig,
        extensions: Vec<String>,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::rooted_at(temp_dir.path());
        std::fs::create_dir_all(&config.download.output_dir).unwrap();
        Fixture {
            output: config.download.output_dir.clone(),
            ledger: config.ledger,
            extensions: DownloadConfig::default().accepted_extensions,
            _temp_dir: temp_dir,
        }
    }

    /// Create `name` with a modification time `age_secs` seconds before a fixed point
    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        std::fs::write(&path, b"image").unwrap();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(base - Duration::from_secs(age_secs)).unwrap();
    }

    fn keys(values: &[i64]) -> BTreeSet<OccurrenceKey> {
        values.iter().copied().map(OccurrenceKey).collect()
    }

    fn names(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_prunes_oldest_first() {
        let fx = fixture();
        // Twelve images for a target of ten; 1 and 2 are the oldest
        for key in 1..=12u64 {
            touch(&fx.output, &format!("{}.jpg", key), 100 - key);
        }
        let all: Vec<i64> = (1..=12).collect();
        ledger::write_ids(&fx.ledger.ids_path, &keys(&all)).await.unwrap();

        let report = reconcile(10, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        assert_eq!(report.removed, vec![OccurrenceKey(1), OccurrenceKey(2)]);
        assert_eq!(report.retained, keys(&(3..=12).collect::<Vec<_>>()));
        assert!(!fx.output.join("1.jpg").exists());
        assert!(!fx.output.join("2.jpg").exists());
        assert_eq!(
            ledger::read_ids(&fx.ledger.ids_path).await.unwrap(),
            report.retained
        );
    }

    #[tokio::test]
    async fn test_under_target_deletes_nothing() {
        let fx = fixture();
        for key in 1..=3 {
            touch(&fx.output, &format!("{}.png", key), 10);
        }
        ledger::write_ids(&fx.ledger.ids_path, &keys(&[1, 2, 3])).await.unwrap();

        let report = reconcile(5, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        assert!(report.removed.is_empty());
        assert_eq!(report.retained, keys(&[1, 2, 3]));
        assert!(report.adopted.is_empty());
        assert!(report.dropped.is_empty());
    }

    #[tokio::test]
    async fn test_equal_mtimes_break_ties_by_name() {
        let fx = fixture();
        for name in ["30.jpg", "10.jpg", "20.jpg"] {
            touch(&fx.output, name, 5);
        }
        ledger::write_ids(&fx.ledger.ids_path, &keys(&[10, 20, 30])).await.unwrap();

        let report = reconcile(1, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        // Lexical order: "10.jpg" < "20.jpg" < "30.jpg"
        assert_eq!(report.removed, vec![OccurrenceKey(10), OccurrenceKey(20)]);
        assert_eq!(report.retained, keys(&[30]));
    }

    #[tokio::test]
    async fn test_ignores_foreign_files() {
        let fx = fixture();
        touch(&fx.output, "1.jpg", 10);
        touch(&fx.output, "2.jpg", 5);
        touch(&fx.output, "cover.jpg", 50);
        touch(&fx.output, "3.gif", 50);
        touch(&fx.output, ".partial-abc.tmp", 50);
        ledger::write_ids(&fx.ledger.ids_path, &keys(&[1, 2])).await.unwrap();

        let report = reconcile(1, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        assert_eq!(report.removed, vec![OccurrenceKey(1)]);
        let remaining = names(&fx.output);
        assert!(remaining.contains("cover.jpg"));
        assert!(remaining.contains("3.gif"));
        assert!(remaining.contains("2.jpg"));
    }

    #[tokio::test]
    async fn test_license_ledger_follows_retained_set() {
        let fx = fixture();
        touch(&fx.output, "1.jpg", 20);
        touch(&fx.output, "2.jpg", 10);
        ledger::write_ids(&fx.ledger.ids_path, &keys(&[1, 2])).await.unwrap();
        let mut licenses = ledger::LicenseLedger::new();
        licenses.insert(OccurrenceKey(1), "CC0".to_string());
        licenses.insert(OccurrenceKey(2), "CC_BY".to_string());
        ledger::write_licenses(&fx.ledger.licenses_path, &licenses)
            .await
            .unwrap();

        reconcile(1, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        let licenses = ledger::read_licenses(&fx.ledger.licenses_path).await.unwrap();
        assert_eq!(licenses.len(), 1);
        assert_eq!(licenses[&OccurrenceKey(2)], "CC_BY");
    }

    #[tokio::test]
    async fn test_ledger_matches_files_after_drift() {
        let fx = fixture();
        // 5 is on disk but not in the ledger; 9 is in the ledger but not on disk
        touch(&fx.output, "4.jpg", 10);
        touch(&fx.output, "5.jpg", 10);
        ledger::write_ids(&fx.ledger.ids_path, &keys(&[4, 9])).await.unwrap();

        let report = reconcile(10, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        assert_eq!(report.adopted, vec![OccurrenceKey(5)]);
        assert_eq!(report.dropped, vec![OccurrenceKey(9)]);
        assert_eq!(
            ledger::read_ids(&fx.ledger.ids_path).await.unwrap(),
            keys(&[4, 5])
        );
    }

    #[tokio::test]
    async fn test_adopted_image_gets_license_entry() {
        let fx = fixture();
        touch(&fx.output, "1.jpg", 10);
        touch(&fx.output, "900.jpg", 500);
        ledger::write_ids(&fx.ledger.ids_path, &keys(&[1])).await.unwrap();
        let mut licenses = ledger::LicenseLedger::new();
        licenses.insert(OccurrenceKey(1), "CC0".to_string());
        ledger::write_licenses(&fx.ledger.licenses_path, &licenses)
            .await
            .unwrap();

        let report = reconcile(10, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        assert_eq!(report.adopted, vec![OccurrenceKey(900)]);
        let licenses = ledger::read_licenses(&fx.ledger.licenses_path).await.unwrap();
        assert_eq!(licenses.keys().copied().collect::<BTreeSet<_>>(), keys(&[1, 900]));
        assert_eq!(licenses[&OccurrenceKey(1)], "CC0");
        assert_eq!(licenses[&OccurrenceKey(900)], "");
    }

    #[tokio::test]
    async fn test_vanished_image_counts_as_removed() {
        let fx = fixture();
        let path = fx.output.join("42.jpg");

        remove_image(&path).await.unwrap();

        touch(&fx.output, "42.jpg", 1);
        remove_image(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_superseded_duplicate_extension() {
        let fx = fixture();
        touch(&fx.output, "7.jpg", 30);
        touch(&fx.output, "7.png", 10);
        ledger::write_ids(&fx.ledger.ids_path, &keys(&[7])).await.unwrap();

        let report = reconcile(5, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        assert_eq!(report.superseded, vec![fx.output.join("7.jpg")]);
        assert!(fx.output.join("7.png").exists());
        assert_eq!(report.retained, keys(&[7]));
    }

    #[tokio::test]
    async fn test_missing_output_dir_and_ledger() {
        let fx = fixture();
        std::fs::remove_dir_all(&fx.output).unwrap();

        let report = reconcile(3, &fx.output, &fx.extensions, &fx.ledger)
            .await
            .unwrap();

        assert!(report.retained.is_empty());
        assert_eq!(std::fs::read_to_string(&fx.ledger.ids_path).unwrap(), "");
    }

    #[test]
    fn test_image_key() {
        let ext = DownloadConfig::default().accepted_extensions;
        assert_eq!(image_key(Path::new("/o/12.jpg"), &ext), Some(OccurrenceKey(12)));
        assert_eq!(image_key(Path::new("/o/12.TIF"), &ext), Some(OccurrenceKey(12)));
        assert_eq!(image_key(Path::new("/o/12.gif"), &ext), None);
        assert_eq!(image_key(Path::new("/o/ids.txt"), &ext), None);
        assert_eq!(image_key(Path::new("/o/abc.jpg"), &ext), None);
        assert_eq!(image_key(Path::new("/o/12"), &ext), None);
    }
}
