//! Harness configuration
//!
//! Loaded from `READCACHE_*` environment variables. Every value has a
//! default, so an empty environment yields a working configuration that
//! allocates one bucket per case and runs the whole catalog.

use crate::error::{HarnessError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default tester image; carries the Go toolchain the conformance tests need
pub const DEFAULT_IMAGE: &str = "golang:1.22";

/// CSI driver that mounts the test volumes
pub const DEFAULT_CSI_DRIVER: &str = "gcsfuse.csi.storage.gke.io";

/// Repository holding the read-cache integration tests
pub const DEFAULT_CONFORMANCE_REPO: &str = "https://github.com/GoogleCloudPlatform/gcsfuse.git";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Where case volumes get their bucket from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketMode {
    /// Every case mounts this pre-existing bucket; nothing is allocated
    Static(String),
    /// Each case gets a fresh bucket named `<prefix>-<case>-<id>`, created
    /// and deleted through `cli`
    PerCase { prefix: String, cli: String },
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Namespace to run in; `None` creates a throwaway one per suite
    pub namespace: Option<String>,
    pub image: String,
    pub csi_driver: String,
    pub bucket: BucketMode,
    pub conformance_repo: String,
    pub pod_start_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound for releasing one case's resources
    pub cleanup_timeout: Duration,
    /// Deadline for the whole suite
    pub suite_timeout: Option<Duration>,
    /// Only run cases whose name or selector contains this
    pub focus: String,
    pub report_path: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            image: DEFAULT_IMAGE.to_string(),
            csi_driver: DEFAULT_CSI_DRIVER.to_string(),
            bucket: BucketMode::PerCase {
                prefix: "readcache-e2e".to_string(),
                cli: "gcloud".to_string(),
            },
            conformance_repo: DEFAULT_CONFORMANCE_REPO.to_string(),
            pod_start_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
            cleanup_timeout: Duration::from_secs(120),
            suite_timeout: None,
            focus: String::new(),
            report_path: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bucket = match get("READCACHE_BUCKET") {
            Some(bucket) => BucketMode::Static(bucket),
            None => BucketMode::PerCase {
                prefix: get("READCACHE_BUCKET_PREFIX")
                    .unwrap_or_else(|| "readcache-e2e".to_string()),
                cli: get("READCACHE_BUCKET_CLI").unwrap_or_else(|| "gcloud".to_string()),
            },
        };

        let log_format = match get("READCACHE_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(HarnessError::Config(format!(
                    "READCACHE_LOG_FORMAT must be 'json' or 'pretty', got '{other}'"
                )));
            }
        };

        Ok(Self {
            namespace: get("READCACHE_NAMESPACE"),
            image: get("READCACHE_IMAGE").unwrap_or(defaults.image),
            csi_driver: get("READCACHE_CSI_DRIVER").unwrap_or(defaults.csi_driver),
            bucket,
            conformance_repo: get("READCACHE_CONFORMANCE_REPO")
                .unwrap_or(defaults.conformance_repo),
            pod_start_timeout: secs(&get, "READCACHE_POD_START_TIMEOUT_SECS")?
                .unwrap_or(defaults.pod_start_timeout),
            poll_interval: secs(&get, "READCACHE_POLL_INTERVAL_SECS")?
                .unwrap_or(defaults.poll_interval),
            cleanup_timeout: secs(&get, "READCACHE_CLEANUP_TIMEOUT_SECS")?
                .unwrap_or(defaults.cleanup_timeout),
            suite_timeout: secs(&get, "READCACHE_SUITE_TIMEOUT_SECS")?,
            focus: get("READCACHE_FOCUS").unwrap_or_default(),
            report_path: get("READCACHE_REPORT_PATH").map(PathBuf::from),
            log_level: get("READCACHE_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
        })
    }
}

/// Parse a positive number of seconds
fn secs<F>(get: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(HarnessError::Config(format!(
            "{key} must be a positive number of seconds, got '{raw}'"
        ))),
        Ok(n) => Ok(Some(Duration::from_secs(n))),
    }
}
