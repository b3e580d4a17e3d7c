//! Volume provisioning
//!
//! Acquires storage through a [`VolumeDriver`] and stamps the case's cache
//! configuration onto the volume attributes.

use crate::error::{CaseError, CleanupError};
use readcache_core::{TestCase, VolumeAttributes, VolumeDriver, VolumeResource};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A provisioned volume, owned by one case run
#[derive(Debug)]
pub struct VolumeHandle {
    resource: VolumeResource,
    bucket_name: String,
}

impl VolumeHandle {
    /// Bucket the conformance run targets
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn attributes(&self) -> &VolumeAttributes {
        &self.resource.attributes
    }

    pub fn csi_driver(&self) -> &str {
        &self.resource.csi_driver
    }

    pub fn resource(&self) -> &VolumeResource {
        &self.resource
    }

    fn describe(&self) -> String {
        format!("volume/{}", self.resource.id)
    }
}

/// Turns cases into configured volumes
#[derive(Clone)]
pub struct VolumeProvisioner {
    driver: Arc<dyn VolumeDriver>,
}

impl VolumeProvisioner {
    pub fn new(driver: Arc<dyn VolumeDriver>) -> Self {
        Self { driver }
    }

    /// Allocate a volume and stamp the case's cache attributes on it
    ///
    /// Fails with [`CaseError::Provision`] when the driver cannot allocate
    /// or returns a volume without a bucket name. In the latter case the
    /// partially allocated volume is released before returning.
    pub async fn provision(&self, case: &TestCase) -> Result<VolumeHandle, CaseError> {
        let prefix = case.name().to_ascii_lowercase();
        let mut resource = self
            .driver
            .create(&prefix)
            .await
            .map_err(|e| CaseError::Provision(format!("{} driver: {e}", self.driver.name())))?;

        let Some(bucket_name) = resource.attributes.bucket_name().map(str::to_string) else {
            if let Err(e) = self.driver.delete(&resource).await {
                warn!(volume = %resource.id, error = %e, "Failed to release volume without bucket");
            }
            return Err(CaseError::Provision(format!(
                "volume {} has no bucket name",
                resource.id
            )));
        };

        for (key, value) in case.cache_attributes() {
            resource.attributes.insert(key, value);
        }

        info!(
            case = %case.name(),
            volume = %resource.id,
            bucket = %bucket_name,
            capacity = %case.file_cache_capacity(),
            range_read = case.range_read_enabled(),
            ttl_secs = case.metadata_ttl_secs(),
            "Volume provisioned"
        );

        Ok(VolumeHandle {
            resource,
            bucket_name,
        })
    }

    /// Release the volume, appending any failure to `errors`
    pub async fn release(&self, handle: VolumeHandle, errors: &mut CleanupError) {
        match self.driver.delete(&handle.resource).await {
            Ok(()) => debug!(volume = %handle.resource.id, "Volume released"),
            Err(e) => {
                warn!(volume = %handle.resource.id, error = %e, "Failed to release volume");
                errors.push(handle.describe(), e.to_string());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use readcache_core::DriverError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Driver {
        bucket: Option<&'static str>,
        fail_create: bool,
        fail_delete: bool,
        deletes: AtomicUsize,
    }

    impl Driver {
        fn new(bucket: Option<&'static str>) -> Self {
            Self {
                bucket,
                fail_create: false,
                fail_delete: false,
                deletes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VolumeDriver for Driver {
        fn name(&self) -> &'static str {
            "test"
        }

        async fn create(&self, prefix: &str) -> Result<VolumeResource, DriverError> {
            if self.fail_create {
                return Err(DriverError::Allocate("quota exceeded".to_string()));
            }
            let mut attributes = VolumeAttributes::new();
            if let Some(bucket) = self.bucket {
                attributes.insert("bucketName", bucket);
            }
            Ok(VolumeResource {
                id: prefix.to_string(),
                csi_driver: "csi.test".to_string(),
                attributes,
            })
        }

        async fn delete(&self, _volume: &VolumeResource) -> Result<(), DriverError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                return Err(DriverError::Release("bucket busy".to_string()));
            }
            Ok(())
        }
    }

    fn case() -> TestCase {
        TestCase::new("TestDisabledCacheTTLTest-1", "TestDisabledCacheTTLTest/TestX")
            .cache_capacity("9Mi")
            .ttl_secs(0)
    }

    #[tokio::test]
    async fn test_provision_stamps_cache_attributes() {
        let provisioner = VolumeProvisioner::new(Arc::new(Driver::new(Some("bucket-1"))));
        let handle = provisioner.provision(&case()).await.unwrap();

        assert_eq!(handle.bucket_name(), "bucket-1");
        assert_eq!(handle.csi_driver(), "csi.test");
        assert_eq!(handle.resource().id, "testdisabledcachettltest-1");
        let attrs = handle.attributes();
        assert_eq!(attrs.get("fileCacheCapacity"), Some("9Mi"));
        assert_eq!(attrs.get("fileCacheForRangeRead"), Some("false"));
        assert_eq!(attrs.get("metadataCacheTTLSeconds"), Some("0"));
        assert_eq!(attrs.get("bucketName"), Some("bucket-1"));
    }

    #[tokio::test]
    async fn test_driver_failure_is_provision_error() {
        let mut driver = Driver::new(Some("bucket-1"));
        driver.fail_create = true;
        let provisioner = VolumeProvisioner::new(Arc::new(driver));

        let err = provisioner.provision(&case()).await.unwrap_err();
        assert!(matches!(err, CaseError::Provision(msg) if msg.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn test_missing_bucket_releases_partial_volume() {
        let driver = Arc::new(Driver::new(None));
        let provisioner = VolumeProvisioner::new(driver.clone());

        let err = provisioner.provision(&case()).await.unwrap_err();
        assert!(matches!(err, CaseError::Provision(_)));
        assert_eq!(driver.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_collects_errors() {
        let mut driver = Driver::new(Some("bucket-1"));
        driver.fail_delete = true;
        let provisioner = VolumeProvisioner::new(Arc::new(driver));
        let handle = provisioner.provision(&case()).await.unwrap();

        let mut errors = CleanupError::new();
        provisioner.release(handle, &mut errors).await;
        assert_eq!(errors.failures().len(), 1);
        assert_eq!(errors.failures()[0].resource, "volume/testdisabledcachettltest-1");
    }
}
