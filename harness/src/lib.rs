//! readcache-harness - Execution engine for the read-cache conformance suite
//!
//! Drives every case of the read-cache matrix through the same life cycle:
//!
//! ```text
//! provision volume ─► deploy pod ─► verify mount mode ─► run conformance
//!                                                              │
//!                   delete volume ◄── delete pod ◄─────────────┘
//! ```
//!
//! # Architecture
//!
//! - [`catalog`] - the fixed matrix of cases
//! - [`provision`] - volumes through a [`VolumeDriver`](readcache_core::VolumeDriver)
//! - [`orchestrate`] - tester pods through a [`PodClient`](readcache_core::PodClient)
//! - [`verify`] - the mount-mode check
//! - [`conformance`] - the external test binary
//! - [`executor`] - one case end to end, including cleanup
//! - [`suite`] - all selected cases, in order
//!
//! [`k8s`] and [`bucket`] are the production collaborators; tests swap them
//! for in-memory fakes.
//!
//! # Example
//!
//! ```ignore
//! let config = HarnessConfig::from_env()?;
//! let client = kube::Client::try_default().await?;
//! let namespace = TestNamespace::create(client.clone()).await?;
//!
//! let executor = CaseExecutor::from_config(
//!     &config,
//!     namespace.name(),
//!     Arc::new(KubePodClient::new(client)),
//!     driver_for(&config.bucket, &config.csi_driver),
//! );
//! let cases = CaseCatalog::read_cache().focus(&config.focus);
//! let report = SuiteRunner::new(executor).run(&cases, &CancellationToken::new()).await;
//! namespace.delete().await?;
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod bucket;
pub mod catalog;
pub mod config;
pub mod conformance;
pub mod error;
pub mod executor;
pub mod k8s;
pub mod orchestrate;
pub mod provision;
pub mod scope;
pub mod suite;
pub mod verify;

pub use bucket::{CommandBucketDriver, StaticBucketDriver, driver_for};
pub use catalog::CaseCatalog;
pub use config::{BucketMode, HarnessConfig, LogFormat};
pub use error::{HarnessError, Result};
pub use executor::{CaseExecutor, CaseOutcome};
pub use k8s::{KubePodClient, TestNamespace};
pub use suite::{CaseReport, SuiteReport, SuiteRunner};

// Re-export core types for convenience
pub use readcache_core::{
    CaseError, CleanupError, ExecutionResult, Phase, PodClient, TestCase, VolumeDriver,
};
