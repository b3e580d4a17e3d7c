//! Volume driver trait
//!
//! The [`VolumeDriver`] trait is the seam between the harness and whatever
//! allocates the storage behind a test volume (a bucket, a claim, ...).

use crate::attribute_keys;
use crate::error::DriverError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

/// String-keyed configuration consumed by the storage driver at mount time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeAttributes(BTreeMap<String, String>);

impl VolumeAttributes {
    /// No attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Bucket assigned by the driver, if any
    pub fn bucket_name(&self) -> Option<&str> {
        self.get(attribute_keys::BUCKET_NAME)
    }

    /// Pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attribute is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the attributes as a plain map
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VolumeAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A volume allocated by a [`VolumeDriver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeResource {
    /// Driver-specific identifier, used again on release
    pub id: String,
    /// CSI driver that mounts the volume
    pub csi_driver: String,
    /// Attributes the driver mounts the volume with
    pub attributes: VolumeAttributes,
}

/// Allocates and releases the storage behind test volumes
///
/// # Implementation Requirements
///
/// - Drivers must be `Send + Sync`; the harness holds them behind `Arc`
/// - `create` must return attributes containing
///   [`BUCKET_NAME`](crate::attribute_keys::BUCKET_NAME)
/// - `delete` must tolerate a resource that is already gone
///
/// # Example
///
/// ```ignore
/// use readcache_core::{DriverError, VolumeAttributes, VolumeDriver, VolumeResource};
/// use async_trait::async_trait;
///
/// struct FixedBucket(String);
///
/// #[async_trait]
/// impl VolumeDriver for FixedBucket {
///     fn name(&self) -> &'static str {
///         "fixed"
///     }
///
///     async fn create(&self, _prefix: &str) -> Result<VolumeResource, DriverError> {
///         Ok(VolumeResource {
///             id: self.0.clone(),
///             csi_driver: "gcsfuse.csi.storage.gke.io".to_string(),
///             attributes: [("bucketName", self.0.as_str())].into_iter().collect(),
///         })
///     }
///
///     async fn delete(&self, _volume: &VolumeResource) -> Result<(), DriverError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait VolumeDriver: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Allocate storage for one case
    ///
    /// `prefix` is derived from the case name and may be used to make
    /// allocated resources recognisable.
    async fn create(&self, prefix: &str) -> Result<VolumeResource, DriverError>;

    /// Release storage allocated by [`create`](Self::create)
    async fn delete(&self, volume: &VolumeResource) -> Result<(), DriverError>;
}
