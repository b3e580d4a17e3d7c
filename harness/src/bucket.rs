//! Bucket volume drivers
//!
//! [`StaticBucketDriver`] hands every case the same pre-existing bucket.
//! [`CommandBucketDriver`] creates a fresh bucket per case by shelling out
//! to the storage CLI and removes it, contents included, on release.

use crate::config::BucketMode;
use crate::error::DriverError;
use async_trait::async_trait;
use readcache_core::{VolumeAttributes, VolumeDriver, VolumeResource, attribute_keys};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Bucket names are limited to 63 characters
const MAX_BUCKET_NAME: usize = 63;

fn bucket_volume(id: String, csi_driver: &str, bucket: &str) -> VolumeResource {
    let attributes: VolumeAttributes = [(attribute_keys::BUCKET_NAME, bucket)].into_iter().collect();
    VolumeResource {
        id,
        csi_driver: csi_driver.to_string(),
        attributes,
    }
}

/// Mounts one existing bucket for every case; allocation and release are
/// no-ops
#[derive(Debug, Clone)]
pub struct StaticBucketDriver {
    bucket: String,
    csi_driver: String,
}

impl StaticBucketDriver {
    pub fn new(bucket: impl Into<String>, csi_driver: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            csi_driver: csi_driver.into(),
        }
    }
}

#[async_trait]
impl VolumeDriver for StaticBucketDriver {
    fn name(&self) -> &'static str {
        "static-bucket"
    }

    async fn create(&self, prefix: &str) -> Result<VolumeResource, DriverError> {
        Ok(bucket_volume(
            format!("{prefix}@{}", self.bucket),
            &self.csi_driver,
            &self.bucket,
        ))
    }

    async fn delete(&self, _volume: &VolumeResource) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Creates one bucket per case through a storage CLI (`gcloud` by default)
#[derive(Debug, Clone)]
pub struct CommandBucketDriver {
    cli: String,
    prefix: String,
    csi_driver: String,
}

impl CommandBucketDriver {
    pub fn new(
        cli: impl Into<String>,
        prefix: impl Into<String>,
        csi_driver: impl Into<String>,
    ) -> Self {
        Self {
            cli: cli.into(),
            prefix: prefix.into(),
            csi_driver: csi_driver.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(), String> {
        debug!(cli = %self.cli, ?args, "Running storage command");
        let output = Command::new(&self.cli)
            .args(args)
            .stdin(Stdio::null())
            // An abandoned allocation must not outlive its task
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to spawn {}: {e}", self.cli))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} {} exited with {}: {}",
                self.cli,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

#[async_trait]
impl VolumeDriver for CommandBucketDriver {
    fn name(&self) -> &'static str {
        "command-bucket"
    }

    async fn create(&self, prefix: &str) -> Result<VolumeResource, DriverError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let bucket = bucket_name(&self.prefix, prefix, &id[..8]);
        let url = format!("gs://{bucket}");

        self.run(&["storage", "buckets", "create", &url, "--quiet"])
            .await
            .map_err(DriverError::Allocate)?;
        info!(bucket = %bucket, "Bucket created");

        Ok(bucket_volume(bucket.clone(), &self.csi_driver, &bucket))
    }

    async fn delete(&self, volume: &VolumeResource) -> Result<(), DriverError> {
        let url = format!("gs://{}", volume.id);
        match self.run(&["storage", "rm", "--recursive", &url, "--quiet"]).await {
            Ok(()) => {
                info!(bucket = %volume.id, "Bucket deleted");
                Ok(())
            }
            // Already gone
            Err(msg) if msg.contains("404") || msg.contains("not found") => Ok(()),
            Err(msg) => Err(DriverError::Release(msg)),
        }
    }
}

/// The driver selected by `mode`
pub fn driver_for(mode: &BucketMode, csi_driver: &str) -> Arc<dyn VolumeDriver> {
    match mode {
        BucketMode::Static(bucket) => Arc::new(StaticBucketDriver::new(bucket, csi_driver)),
        BucketMode::PerCase { prefix, cli } => {
            Arc::new(CommandBucketDriver::new(cli, prefix, csi_driver))
        }
    }
}

/// `<prefix>-<case>-<id>`, lowercased, limited to `[a-z0-9-]` and 63 chars
///
/// The case part is truncated so the unique suffix always survives.
pub fn bucket_name(prefix: &str, case: &str, id: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_alphanumeric() { c } else { '-' }
            })
            .collect()
    };
    let prefix = clean(prefix);
    let id = clean(id);
    let budget = MAX_BUCKET_NAME.saturating_sub(prefix.len() + id.len() + 2);
    let case: String = clean(case).chars().take(budget).collect();
    let case = case.trim_matches('-');
    format!("{prefix}-{case}-{id}")
}
