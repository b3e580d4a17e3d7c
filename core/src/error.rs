//! Error types for the read-cache harness

use crate::phase::Phase;
use std::fmt;
use thiserror::Error;

/// Error from a [`PodClient`](crate::PodClient) call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The API server rejected or failed the request
    #[error("api error: {0}")]
    Api(String),

    /// The command could not be run in the pod
    ///
    /// A command that ran and exited non-zero is not an error; see
    /// [`ExecutionResult`](crate::ExecutionResult).
    #[error("exec error: {0}")]
    Exec(String),

    /// Waited too long for the cluster
    #[error("timed out: {0}")]
    Timeout(String),
}

/// Error from a [`VolumeDriver`](crate::VolumeDriver) call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Storage could not be allocated
    #[error("allocation failed: {0}")]
    Allocate(String),

    /// Storage could not be released
    #[error("release failed: {0}")]
    Release(String),
}

/// A resource that could not be released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Resource description, e.g. `pod/readcache-1a2b3c4d`
    pub resource: String,
    /// Why the release failed
    pub message: String,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}

/// Every release failure of one case, reported together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupError {
    failures: Vec<CleanupFailure>,
}

impl CleanupError {
    /// No failures yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `resource` could not be released
    pub fn push(&mut self, resource: impl Into<String>, message: impl Into<String>) {
        self.failures.push(CleanupFailure {
            resource: resource.into(),
            message: message.into(),
        });
    }

    /// Append every failure from `other`
    pub fn extend(&mut self, other: CleanupError) {
        self.failures.extend(other.failures);
    }

    /// Failures in the order they were recorded
    pub fn failures(&self) -> &[CleanupFailure] {
        &self.failures
    }

    /// Whether everything was released
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Err(self)` when anything failed
    pub fn into_result(self) -> Result<(), CleanupError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.as_slice() {
            [] => f.write_str("no cleanup failures"),
            [only] => write!(f, "{only}"),
            many => {
                f.write_str("[")?;
                for (i, failure) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{failure}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl std::error::Error for CleanupError {}

/// Why a case failed
///
/// Variants are listed in the order a case runs into them; the first one
/// hit is the verdict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    /// The volume could not be allocated
    #[error("provision failed: {0}")]
    Provision(String),

    /// The pod never reached the running state
    #[error("deploy failed: {0}")]
    Deploy(String),

    /// The volume is not mounted with the requested access mode
    #[error("mount {mount_path} has no '{expected}' entry (check exit code {exit_code})")]
    MountAssertion {
        /// Mount point that was checked
        mount_path: String,
        /// Access mode token that was looked for, `"ro,"` or `"rw,"`
        expected: String,
        /// Exit code of the mount table check
        exit_code: i32,
        /// Output of the mount table check
        output: String,
    },

    /// The conformance source could not be fetched into the pod
    #[error("fetching conformance source failed with exit code {exit_code}")]
    SourceFetch {
        /// Exit code of the fetch command
        exit_code: i32,
        /// Output of the fetch command
        output: String,
    },

    /// The external conformance binary reported a failure
    #[error("conformance test failed with exit code {exit_code}")]
    Conformance {
        /// Exit code of the test binary
        exit_code: i32,
        /// Combined output of the test binary
        output: String,
    },

    /// A cluster call failed outright while in `phase`
    #[error("cluster error after {phase}: {source}")]
    Cluster {
        /// Furthest phase reached before the call
        phase: Phase,
        /// The failed call
        source: ClusterError,
    },

    /// The run was cancelled while in `phase`
    #[error("cancelled after {phase}")]
    Cancelled {
        /// Furthest phase reached before cancellation
        phase: Phase,
    },

    /// Everything passed but resources could not be released
    #[error("cleanup failed: {0}")]
    Cleanup(CleanupError),
}

impl CaseError {
    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            CaseError::Provision(_) => "provision",
            CaseError::Deploy(_) => "deploy",
            CaseError::MountAssertion { .. } => "mount_assertion",
            CaseError::SourceFetch { .. } => "source_fetch",
            CaseError::Conformance { .. } => "conformance",
            CaseError::Cluster { .. } => "cluster",
            CaseError::Cancelled { .. } => "cancelled",
            CaseError::Cleanup(_) => "cleanup",
        }
    }

    /// Captured command output, for failures that have one
    pub fn output(&self) -> Option<&str> {
        match self {
            CaseError::MountAssertion { output, .. }
            | CaseError::SourceFetch { output, .. }
            | CaseError::Conformance { output, .. } => Some(output),
            _ => None,
        }
    }
}
