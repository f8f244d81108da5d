//! Configuration types for manga-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download queue configuration (directories, concurrency, timeouts, retries)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory pages are written under (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrently active downloads (default: 3)
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Deadline for fetching and writing a single page (default: 30 seconds)
    #[serde(default = "default_page_timeout", with = "duration_serde")]
    pub page_timeout: Duration,

    /// Fallback wake-up interval for the dispatch loop (default: 500 ms)
    ///
    /// The dispatch loop is woken on enqueue and on slot release; this interval
    /// only bounds how long it sleeps when no signal arrives.
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Extension used when a page URL carries none (default: "jpg")
    #[serde(default = "default_extension")]
    pub default_extension: String,

    /// Retry policy for failed downloads
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            page_timeout: default_page_timeout(),
            poll_interval: default_poll_interval(),
            default_extension: default_extension(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for failed downloads
///
/// A failed task is restarted from its first page up to `max_retries` times,
/// waiting an exponentially growing delay between attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound on the delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
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
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Library update scheduler configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Interval between automatic library updates; zero disables the loop (default: 6 hours)
    #[serde(default = "default_update_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Maximum concurrently running update checks (default: 4)
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Only check items the reader has history for (default: true)
    #[serde(default = "default_true")]
    pub only_with_history: bool,

    /// Only check items the source flags as completed (default: false)
    #[serde(default)]
    pub only_completed: bool,

    /// Emit notifications for new chapters and finished runs (default: true)
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    /// Number of run summaries retained (default: 50)
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Number of notifications retained (default: 100)
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            interval: default_update_interval(),
            max_concurrent_checks: default_max_concurrent_checks(),
            only_with_history: true,
            only_completed: false,
            notifications_enabled: true,
            history_capacity: default_history_capacity(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

/// Main configuration
///
/// - [`download`](DownloadConfig) - download root, concurrency, timeouts, retry policy
/// - [`update`](UpdateConfig) - update interval, fan-out ceiling, filters, retention
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download queue settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Library update settings
    #[serde(default)]
    pub update: UpdateConfig,
}

impl Config {
    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&contents)
    }

    /// Check the configuration for values the orchestration core cannot run with
    pub fn validate(&self) -> Result<()> {
        self.download.validate()?;
        self.update.validate()
    }
}

impl DownloadConfig {
    /// Validate download settings
    pub fn validate(&self) -> Result<()> {
        if self.download_dir.as_os_str().is_empty() {
            return Err(Error::config("download_dir", "download directory is empty"));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads",
                "at least one concurrent download is required",
            ));
        }
        if self.page_timeout.is_zero() {
            return Err(Error::config("page_timeout", "page timeout must be non-zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll_interval", "poll interval must be non-zero"));
        }
        if self.default_extension.is_empty() || self.default_extension.contains('.') {
            return Err(Error::config(
                "default_extension",
                "extension must be non-empty and given without a dot",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff multiplier must be at least 1.0",
            ));
        }
        Ok(())
    }
}

impl UpdateConfig {
    /// Validate update settings
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_checks == 0 {
            return Err(Error::config(
                "max_concurrent_checks",
                "at least one concurrent check is required",
            ));
        }
        if self.history_capacity == 0 {
            return Err(Error::config("history_capacity", "capacity must be non-zero"));
        }
        if self.notification_capacity == 0 {
            return Err(Error::config(
                "notification_capacity",
                "capacity must be non-zero",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_concurrent_downloads() -> usize {
    3
}

fn default_page_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_extension() -> String {
    "jpg".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_update_interval() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_max_concurrent_checks() -> usize {
    4
}

fn default_history_capacity() -> usize {
    50
}

fn default_notification_capacity() -> usize {
    100
}

fn default_true() -> bool {
    true
}

// Durations travel as integer milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(crate::retry::duration_millis(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
