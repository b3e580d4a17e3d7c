//! Reserved volume attribute keys
//!
//! These keys are consumed by the storage driver when it mounts a volume.
//! The harness stamps the cache keys from a [`TestCase`](crate::TestCase)
//! and reads [`BUCKET_NAME`] back after the driver has allocated a volume.

/// Maximum on-disk size of the file cache (size string, e.g. `"50Mi"`)
pub const FILE_CACHE_CAPACITY: &str = "fileCacheCapacity";

/// Whether partial-file reads populate the cache (`"true"` / `"false"`)
pub const FILE_CACHE_FOR_RANGE_READ: &str = "fileCacheForRangeRead";

/// Metadata cache TTL in seconds (integer string, `"0"` disables it)
pub const METADATA_CACHE_TTL_SECONDS: &str = "metadataCacheTTLSeconds";

/// Bucket backing the volume, assigned by the driver
pub const BUCKET_NAME: &str = "bucketName";

/// Comma-joined mount options passed through to the FUSE process
pub const MOUNT_OPTIONS: &str = "mountOptions";
