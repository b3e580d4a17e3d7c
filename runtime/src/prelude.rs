//! Convenience re-exports for suite drivers.
//!
//! ```rust
//! use readcache_runtime::prelude::*;
//! ```

// Case model
pub use readcache_core::{CaseError, Phase, TestCase};

// Engine
pub use readcache_harness::{
    CaseCatalog, CaseExecutor, CaseOutcome, CaseReport, SuiteReport, SuiteRunner,
};

// Collaborators
pub use readcache_harness::{
    CommandBucketDriver, KubePodClient, PodClient, StaticBucketDriver, TestNamespace,
    VolumeDriver, driver_for,
};

// Configuration
pub use readcache_harness::{BucketMode, HarnessConfig, LogFormat};

// Runtime
pub use crate::{RuntimeBuilder, run};
