//! The read-cache conformance matrix
//!
//! Rows mirror the mounted-directory runs of the upstream read-cache
//! integration tests. Each row pairs one sub-test with the cache
//! configuration it expects.

use readcache_core::TestCase;

/// One catalog row; the case name is `<group>-<index>`
struct Row {
    group: &'static str,
    index: u32,
    subtest: &'static str,
    read_only: bool,
    capacity: &'static str,
    range_read: bool,
    ttl_secs: u64,
}

const fn row(
    group: &'static str,
    index: u32,
    subtest: &'static str,
    read_only: bool,
    capacity: &'static str,
    range_read: bool,
    ttl_secs: u64,
) -> Row {
    Row {
        group,
        index,
        subtest,
        read_only,
        capacity,
        range_read,
        ttl_secs,
    }
}

const RANGE_FALSE: &str = "TestCacheFileForRangeReadFalseTest";
const RANGE_TRUE: &str = "TestCacheFileForRangeReadTrueTest";
const DISABLED_TTL: &str = "TestDisabledCacheTTLTest";
const LOCAL_MOD: &str = "TestLocalModificationTest";
const RANGE_READ: &str = "TestRangeReadTest";
const READ_ONLY: &str = "TestReadOnlyTest";
const SMALL_TTL: &str = "TestSmallCacheTTLTest";

#[rustfmt::skip]
const ROWS: &[Row] = &[
    row(RANGE_FALSE, 1, "TestRangeReadsWithCacheMiss", false, "50Mi", false, 3600),
    row(RANGE_FALSE, 2, "TestConcurrentReads_ReadIsTreatedNonSequentialAfterFileIsRemovedFromCache", false, "50Mi", false, 3600),
    row(RANGE_TRUE, 1, "TestRangeReadsWithCacheHit", false, "50Mi", true, 3600),
    row(DISABLED_TTL, 1, "TestReadAfterObjectUpdateIsCacheMiss", false, "9Mi", false, 0),
    row(LOCAL_MOD, 1, "TestReadAfterLocalGCSFuseWriteIsCacheMiss", false, "9Mi", false, 3600),
    row(RANGE_READ, 1, "TestRangeReadsWithinReadChunkSize", false, "500Mi", false, 3600),
    row(RANGE_READ, 2, "TestRangeReadsBeyondReadChunkSizeWithChunkDownloaded", false, "500Mi", false, 3600),
    row(RANGE_READ, 3, "TestRangeReadsBeyondReadChunkSizeWithoutChunkDownloaded", false, "500Mi", false, 3600),
    row(RANGE_READ, 4, "TestRangeReadsWithinReadChunkSize", false, "500Mi", true, 3600),
    row(RANGE_READ, 5, "TestRangeReadsBeyondReadChunkSizeWithChunkDownloaded", false, "500Mi", true, 3600),
    row(RANGE_READ, 6, "TestRangeReadsBeyondReadChunkSizeWithoutChunkDownloaded", false, "500Mi", true, 3600),
    row(READ_ONLY, 1, "TestSecondSequentialReadIsCacheHit", true, "9Mi", false, 3600),
    row(READ_ONLY, 2, "TestReadFileSequentiallyLargerThanCacheCapacity", true, "9Mi", false, 3600),
    row(READ_ONLY, 3, "TestReadFileRandomlyLargerThanCacheCapacity", true, "9Mi", false, 3600),
    row(READ_ONLY, 4, "TestReadMultipleFilesMoreThanCacheLimit", true, "9Mi", false, 3600),
    row(READ_ONLY, 5, "TestReadMultipleFilesWithinCacheLimit", true, "9Mi", false, 3600),
    row(READ_ONLY, 6, "TestSecondSequentialReadIsCacheHit", true, "9Mi", true, 3600),
    row(READ_ONLY, 7, "TestReadFileSequentiallyLargerThanCacheCapacity", true, "9Mi", true, 3600),
    row(READ_ONLY, 8, "TestReadFileRandomlyLargerThanCacheCapacity", true, "9Mi", true, 3600),
    row(READ_ONLY, 9, "TestReadMultipleFilesMoreThanCacheLimit", true, "9Mi", true, 3600),
    row(READ_ONLY, 10, "TestReadMultipleFilesWithinCacheLimit", true, "9Mi", true, 3600),
    row(SMALL_TTL, 1, "TestReadAfterUpdateAndCacheExpiryIsCacheMiss", false, "9Mi", false, 10),
    row(SMALL_TTL, 2, "TestReadForLowMetaDataCacheTTLIsCacheHit", false, "9Mi", false, 10),
];

impl Row {
    fn to_case(&self) -> TestCase {
        TestCase::new(
            format!("{}-{}", self.group, self.index),
            format!("{}/{}", self.group, self.subtest),
        )
        .read_only(self.read_only)
        .cache_capacity(self.capacity)
        .range_read(self.range_read)
        .ttl_secs(self.ttl_secs)
    }
}

/// Ordered, read-only list of cases
#[derive(Debug, Clone)]
pub struct CaseCatalog {
    cases: Vec<TestCase>,
}

impl CaseCatalog {
    /// The built-in read-cache matrix
    pub fn read_cache() -> Self {
        Self {
            cases: ROWS.iter().map(Row::to_case).collect(),
        }
    }

    /// A catalog of hand-picked cases
    ///
    /// Names must be unique.
    pub fn from_cases(cases: Vec<TestCase>) -> Self {
        debug_assert!(
            duplicate_name(&cases).is_none(),
            "duplicate case name in catalog"
        );
        Self { cases }
    }

    /// Every case, in catalog order
    pub fn list_cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Cases whose name or selector contains `filter`, in catalog order.
    /// An empty filter selects everything.
    pub fn focus(&self, filter: &str) -> Vec<TestCase> {
        self.cases
            .iter()
            .filter(|c| filter.is_empty() || c.name().contains(filter) || c.selector().contains(filter))
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl Default for CaseCatalog {
    fn default() -> Self {
        Self::read_cache()
    }
}

fn duplicate_name(cases: &[TestCase]) -> Option<&str> {
    let mut seen = std::collections::HashSet::new();
    cases
        .iter()
        .map(TestCase::name)
        .find(|name| !seen.insert(*name))
}
