//! Filesystem and event assertions shared by the integration tests

use specimen_dl::{Config, Event, OccurrenceKey};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;

/// Image file names in the output directory (ledgers excluded)
pub fn image_files(config: &Config) -> BTreeSet<String> {
    let extensions = &config.download.accepted_extensions;
    match std::fs::read_dir(&config.download.output_dir) {
        Ok(entries) => entries
            .map(|e| e.expect("readable entry").file_name().to_string_lossy().into_owned())
            .filter(|name| extensions.iter().any(|ext| name.ends_with(ext.as_str())))
            .collect(),
        Err(_) => BTreeSet::new(),
    }
}

/// Record keys derived from the image file stems
pub fn image_keys(config: &Config) -> BTreeSet<i64> {
    image_files(config)
        .iter()
        .filter_map(|name| Path::new(name).file_stem()?.to_str()?.parse().ok())
        .collect()
}

/// Keys listed in the identifier ledger
pub fn ledger_keys(config: &Config) -> BTreeSet<i64> {
    std::fs::read_to_string(&config.ledger.ids_path)
        .expect("identifier ledger should exist")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim().parse().expect("ledger line should be a key"))
        .collect()
}

/// Keys listed in the license ledger
pub fn license_keys(config: &Config) -> BTreeSet<i64> {
    let raw = std::fs::read_to_string(&config.ledger.licenses_path)
        .expect("license ledger should exist");
    let ledger: std::collections::BTreeMap<OccurrenceKey, String> =
        serde_json::from_str(&raw).expect("license ledger should be JSON");
    ledger.keys().map(|key| key.get()).collect()
}

/// Files on disk, identifier ledger and license ledger all agree
pub fn assert_ledgers_match_files(config: &Config) {
    let on_disk = image_keys(config);
    assert_eq!(ledger_keys(config), on_disk, "identifier ledger vs files");
    assert_eq!(license_keys(config), on_disk, "license ledger vs files");
}

/// Everything the reporter has published so far
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Write an image file whose modification time lies `age` in the past
pub fn write_stale_image(dir: &Path, name: &str, age: Duration) {
    std::fs::create_dir_all(dir).expect("output dir");
    let path = dir.join(name);
    std::fs::write(&path, b"stale").expect("write stale image");
    let file = std::fs::File::options()
        .write(true)
        .open(&path)
        .expect("open stale image");
    file.set_modified(SystemTime::now() - age)
        .expect("set modification time");
}
