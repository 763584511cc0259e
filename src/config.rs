//! Configuration types for specimen-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf, time::Duration};

/// Upstream API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the GBIF API (default: "https://api.gbif.org/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for search and name-lookup requests (default: 10 seconds)
    #[serde(default = "default_search_timeout", with = "duration_serde")]
    pub search_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Supplementary occurrence search filters (e.g., `country`, `year`)
    ///
    /// Merged over the built-in search parameters, last write wins per key.
    /// `limit` and `offset` are always controlled by the paginator.
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_timeout: default_search_timeout(),
            user_agent: default_user_agent(),
            extra_params: BTreeMap::new(),
        }
    }
}

/// Asset transfer and storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory that receives image files (default: "./output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Timeout for the HEAD probe before a transfer (default: 3 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Timeout for a full image transfer (default: 30 seconds)
    #[serde(default = "default_transfer_timeout", with = "duration_serde")]
    pub transfer_timeout: Duration,

    /// Maximum concurrent transfers within one page (default: 1, sequential)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// File extensions accepted for persisted images, including the leading dot.
    /// Matching is case-sensitive.
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            probe_timeout: default_probe_timeout(),
            transfer_timeout: default_transfer_timeout(),
            max_concurrent_downloads: default_max_concurrent(),
            accepted_extensions: default_accepted_extensions(),
        }
    }
}

/// Record filter policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Only accept records from allow-listed publishing organizations (default: false)
    #[serde(default)]
    pub strict: bool,

    /// Publishing organization keys accepted in strict mode
    #[serde(default)]
    pub allowed_publishers: Vec<String>,

    /// Media formats accepted on the first media item
    #[serde(default = "default_accepted_formats")]
    pub accepted_formats: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            strict: false,
            allowed_publishers: Vec::new(),
            accepted_formats: default_accepted_formats(),
        }
    }
}

/// Ledger and statistics artifact locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Identifier ledger, one record key per line (default: "./output/ids.txt")
    #[serde(default = "default_ids_path")]
    pub ids_path: PathBuf,

    /// License ledger, JSON object keyed by record key (default: "./output/licenses.json")
    #[serde(default = "default_licenses_path")]
    pub licenses_path: PathBuf,

    /// Collect outcome histogram and explicit-license count (default: true)
    #[serde(default = "default_true")]
    pub collect_statistics: bool,

    /// Statistics artifact (default: "./statistics/statistics.json")
    #[serde(default = "default_statistics_path")]
    pub statistics_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ids_path: default_ids_path(),
            licenses_path: default_licenses_path(),
            collect_statistics: true,
            statistics_path: default_statistics_path(),
        }
    }
}

/// Retry configuration for transient transfer failures
///
/// `max_attempts = 0` disables retries: every transport failure is a
/// permanent skip for that record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 5 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Credentials for the citation download request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CitationConfig {
    /// GBIF account name (also used as `creator`)
    #[serde(default)]
    pub username: Option<String>,

    /// GBIF account password
    #[serde(default)]
    pub password: Option<String>,

    /// Address notified when the download is ready
    #[serde(default)]
    pub notification_address: Option<String>,
}

/// Main configuration for the acquisition engine
///
/// Grouped into sub-configs:
/// - [`api`](ApiConfig) — upstream endpoint, timeouts, extra filters
/// - [`download`](DownloadConfig) — output directory, transfer policy
/// - [`filter`](FilterConfig) — publisher allow-list and formats
/// - [`ledger`](LedgerConfig) — ledger and statistics artifacts
/// - [`retry`](RetryConfig) — transient failure handling
/// - [`citation`](CitationConfig) — downstream download request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Asset transfer and storage settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Record filter policy
    #[serde(default)]
    pub filter: FilterConfig,

    /// Ledger and statistics artifacts
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Retry policy for transfers
    #[serde(default)]
    pub retry: RetryConfig,

    /// Citation download request credentials
    #[serde(default)]
    pub citation: CitationConfig,
}

impl Config {
    /// Create a configuration rooted at `dir`: images and ledgers go to
    /// `dir/output`, statistics to `dir/statistics`.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let output = dir.join("output");
        let mut config = Config::default();
        config.ledger.ids_path = output.join("ids.txt");
        config.ledger.licenses_path = output.join("licenses.json");
        config.ledger.statistics_path = dir.join("statistics").join("statistics.json");
        config.download.output_dir = output;
        config
    }

    /// Check the configuration for settings that can never succeed
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("api.base_url", format!("not a valid URL: {}", e)))?;

        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "download.max_concurrent_downloads",
                "must be at least 1",
            ));
        }
        if self.download.accepted_extensions.is_empty() {
            return Err(Error::config(
                "download.accepted_extensions",
                "at least one extension must be accepted",
            ));
        }
        if let Some(bad) = self
            .download
            .accepted_extensions
            .iter()
            .find(|ext| !ext.starts_with('.'))
        {
            return Err(Error::config(
                "download.accepted_extensions",
                format!("extension '{}' must start with a dot", bad),
            ));
        }
        if self.filter.accepted_formats.is_empty() {
            return Err(Error::config(
                "filter.accepted_formats",
                "at least one media format must be accepted",
            ));
        }
        if self.filter.strict && self.filter.allowed_publishers.is_empty() {
            return Err(Error::config(
                "filter.allowed_publishers",
                "strict mode requires at least one allowed publisher",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.gbif.org/v1".to_string()
}

fn default_search_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("specimen-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_concurrent() -> usize {
    1
}

fn default_accepted_extensions() -> Vec<String> {
    [
        ".jpg", ".JPG", ".jpeg", ".JPEG", ".png", ".PNG", ".tif", ".tiff", ".TIF", ".TIFF",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_accepted_formats() -> Vec<String> {
    vec!["image/jpeg".to_string(), "image/png".to_string()]
}

fn default_ids_path() -> PathBuf {
    PathBuf::from("./output/ids.txt")
}

fn default_licenses_path() -> PathBuf {
    PathBuf::from("./output/licenses.json")
}

fn default_statistics_path() -> PathBuf {
    PathBuf::from("./statistics/statistics.json")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Retry delays are sub-second, so they serialize as milliseconds
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_extensions_are_case_sensitive_set() {
        let config = DownloadConfig::default();
        assert_eq!(config.accepted_extensions.len(), 10);
        assert!(config.accepted_extensions.contains(&".TIFF".to_string()));
        assert!(!config.accepted_extensions.contains(&".Jpg".to_string()));
        assert!(!config.accepted_extensions.contains(&".gif".to_string()));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api.base_url, "https://api.gbif.org/v1");
        assert_eq!(config.download.probe_timeout, Duration::from_secs(3));
        assert_eq!(config.download.max_concurrent_downloads, 1);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(500));
        assert!(config.ledger.collect_statistics);
        assert!(!config.filter.strict);
    }

    #[test]
    fn test_partial_json_overrides() {
        let json = r#"{
            "download": { "probe_timeout": 5, "max_concurrent_downloads": 4 },
            "filter": { "strict": true, "allowed_publishers": ["org-1"] },
            "retry": { "max_attempts": 0, "initial_delay": 250 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.download.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.download.max_concurrent_downloads, 4);
        assert_eq!(config.filter.allowed_publishers, vec!["org-1"]);
        assert_eq!(config.retry.max_attempts, 0);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        config.validate().unwrap();
    }

    #[test]
    fn test_strict_without_publishers_rejected() {
        let mut config = Config::default();
        config.filter.strict = true;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("filter.allowed_publishers"))
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.download.max_concurrent_downloads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extension_without_dot_rejected() {
        let mut config = Config::default();
        config.download.accepted_extensions = vec!["jpg".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rooted_at_places_artifacts() {
        let config = Config::rooted_at("/data/run");
        assert_eq!(config.download.output_dir, PathBuf::from("/data/run/output"));
        assert_eq!(
            config.ledger.ids_path,
            PathBuf::from("/data/run/output/ids.txt")
        );
        assert_eq!(
            config.ledger.statistics_path,
            PathBuf::from("/data/run/statistics/statistics.json")
        );
    }
}
