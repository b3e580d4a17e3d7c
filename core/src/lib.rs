//! readcache-core - Core types for the read-cache conformance harness
//!
//! This crate holds the pieces shared between the harness engine and the
//! code that talks to a real cluster:
//!
//! - [`TestCase`] - one row of the conformance matrix
//! - [`VolumeDriver`] trait - allocates storage behind a test volume
//! - [`PodClient`] trait - creates, polls, execs into and deletes pods
//! - [`PodSpec`] - cluster-agnostic workload description
//! - [`CaseError`] - why a case failed, in verdict priority order
//! - [`attribute_keys`] - reserved volume attribute keys
//!
//! Keeping the collaborator traits here lets the engine be exercised with
//! in-memory fakes without pulling in a Kubernetes client.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

/// Reserved volume attribute keys
pub mod attribute_keys;
mod case;
mod cluster;
mod error;
mod exec;
mod phase;
/// Workload pod description
pub mod pod;
mod volume;

pub use case::TestCase;
pub use cluster::{PodClient, PodPhase};
pub use error::{CaseError, CleanupError, CleanupFailure, ClusterError, DriverError};
pub use exec::ExecutionResult;
pub use phase::Phase;
pub use pod::{PodRef, PodSpec};
pub use volume::{VolumeAttributes, VolumeDriver, VolumeResource};
