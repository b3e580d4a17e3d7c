//! Test case descriptors
//!
//! A [`TestCase`] is one row of the conformance matrix: a cache
//! configuration paired with the external sub-test that exercises it.
//! Cases are built once with the chained setters and never mutated after.

use crate::attribute_keys;
use serde::Serialize;

/// Selector prefix of the sub-tests that read large ranges of big files
const RANGE_READ_GROUP: &str = "TestRangeReadTest";

/// One parameterized cache configuration and the sub-test that checks it
///
/// # Example
///
/// ```
/// use readcache_core::TestCase;
///
/// let case = TestCase::new(
///     "TestReadOnlyTest-1",
///     "TestReadOnlyTest/TestSecondSequentialReadIsCacheHit",
/// )
/// .read_only(true)
/// .cache_capacity("9Mi");
///
/// assert_eq!(case.access_mode_token(), "ro,");
/// assert_eq!(case.metadata_ttl_secs(), 3600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    name: String,
    selector: String,
    read_only: bool,
    cache_capacity: String,
    range_read_cache: bool,
    metadata_ttl_secs: u64,
    mount_options: Vec<String>,
}

impl TestCase {
    /// Create a read-write case with a 50Mi cache, range reads not cached
    /// and a one hour metadata TTL.
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            read_only: false,
            cache_capacity: "50Mi".to_string(),
            range_read_cache: false,
            metadata_ttl_secs: 3600,
            mount_options: Vec::new(),
        }
    }

    /// Mount the volume read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set the file cache capacity (Kubernetes quantity, e.g. `"9Mi"`)
    pub fn cache_capacity(mut self, capacity: impl Into<String>) -> Self {
        self.cache_capacity = capacity.into();
        self
    }

    /// Let partial-file reads populate the cache
    pub fn range_read(mut self, enabled: bool) -> Self {
        self.range_read_cache = enabled;
        self
    }

    /// Set the metadata cache TTL; zero disables metadata caching
    pub fn ttl_secs(mut self, secs: u64) -> Self {
        self.metadata_ttl_secs = secs;
        self
    }

    /// Append an extra mount option
    pub fn mount_option(mut self, option: impl Into<String>) -> Self {
        self.mount_options.push(option.into());
        self
    }

    /// Unique case name, e.g. `"TestReadOnlyTest-1"`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sub-test selector passed to the conformance binary's `-run` flag
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Whether the volume is mounted read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// File cache capacity quantity
    pub fn file_cache_capacity(&self) -> &str {
        &self.cache_capacity
    }

    /// Whether partial-file reads populate the cache
    pub fn range_read_enabled(&self) -> bool {
        self.range_read_cache
    }

    /// Metadata cache TTL in seconds
    pub fn metadata_ttl_secs(&self) -> u64 {
        self.metadata_ttl_secs
    }

    /// Case-supplied mount options, in the order they were added
    pub fn mount_options(&self) -> &[String] {
        &self.mount_options
    }

    /// Top-level test function of the selector (`"TestReadOnlyTest"` for
    /// `"TestReadOnlyTest/TestSecondSequentialReadIsCacheHit"`)
    pub fn group(&self) -> &str {
        self.selector
            .split_once('/')
            .map_or(self.selector.as_str(), |(group, _)| group)
    }

    /// Range-read sub-tests read large files and need a bigger pod
    pub fn is_range_read(&self) -> bool {
        self.selector.starts_with(RANGE_READ_GROUP)
    }

    /// Token the mount table line must contain for this case
    pub fn access_mode_token(&self) -> &'static str {
        if self.read_only { "ro," } else { "rw," }
    }

    /// The cache attributes this case stamps onto its volume
    pub fn cache_attributes(&self) -> [(&'static str, String); 3] {
        [
            (
                attribute_keys::FILE_CACHE_CAPACITY,
                self.cache_capacity.clone(),
            ),
            (
                attribute_keys::FILE_CACHE_FOR_RANGE_READ,
                self.range_read_cache.to_string(),
            ),
            (
                attribute_keys::METADATA_CACHE_TTL_SECONDS,
                self.metadata_ttl_secs.to_string(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let case = TestCase::new("c", "TestSmallCacheTTLTest/TestX");
        assert!(!case.is_read_only());
        assert_eq!(case.file_cache_capacity(), "50Mi");
        assert!(!case.range_read_enabled());
        assert_eq!(case.metadata_ttl_secs(), 3600);
        assert!(case.mount_options().is_empty());
        assert_eq!(case.access_mode_token(), "rw,");
    }

    #[test]
    fn test_cache_attributes_render_as_strings() {
        let case = TestCase::new("c", "TestDisabledCacheTTLTest/TestY")
            .cache_capacity("9Mi")
            .range_read(true)
            .ttl_secs(0);

        let attrs = case.cache_attributes();
        assert_eq!(attrs[0], ("fileCacheCapacity", "9Mi".to_string()));
        assert_eq!(attrs[1], ("fileCacheForRangeRead", "true".to_string()));
        assert_eq!(attrs[2], ("metadataCacheTTLSeconds", "0".to_string()));
    }

    #[test]
    fn test_group_and_range_read_category() {
        let range = TestCase::new("r", "TestRangeReadTest/TestRangeReadsWithinReadChunkSize");
        assert_eq!(range.group(), "TestRangeReadTest");
        assert!(range.is_range_read());

        let plain = TestCase::new("p", "TestCacheFileForRangeReadTrueTest/TestRangeReadsWithCacheHit");
        assert_eq!(plain.group(), "TestCacheFileForRangeReadTrueTest");
        assert!(!plain.is_range_read());

        let bare = TestCase::new("b", "TestLocalModificationTest");
        assert_eq!(bare.group(), "TestLocalModificationTest");
    }

    #[test]
    fn test_mount_options_keep_order() {
        let case = TestCase::new("c", "T/x")
            .mount_option("implicit-dirs")
            .mount_option("uid=1000");
        assert_eq!(case.mount_options(), ["implicit-dirs", "uid=1000"]);
    }
}
