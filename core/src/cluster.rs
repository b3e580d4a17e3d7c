//! Pod client trait
//!
//! The [`PodClient`] trait covers the four cluster calls the harness makes
//! against a workload pod. The Kubernetes adapter lives in the harness
//! crate; tests substitute in-memory fakes.

use crate::error::ClusterError;
use crate::exec::ExecutionResult;
use crate::pod::{PodRef, PodSpec};
use async_trait::async_trait;
use serde::Serialize;

/// Lifecycle phase reported for a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PodPhase {
    /// Accepted but not all containers are running yet
    Pending,
    /// Bound to a node with its containers started
    Running,
    /// All containers exited successfully
    Succeeded,
    /// All containers exited, at least one with a failure
    Failed,
    /// Missing or unrecognised phase
    Unknown,
}

impl PodPhase {
    /// Parse the phase string reported in pod status
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    /// The pod has stopped and can never reach `Running`
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

/// Pod operations against a live cluster
///
/// # Implementation Requirements
///
/// - Clients must be `Send + Sync`
/// - `exec` reports a non-zero exit as `Ok` with that exit code; `Err` is
///   reserved for failures to run the command at all
/// - `delete` of a pod that no longer exists is not an error
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Submit the pod
    async fn create(&self, spec: &PodSpec) -> Result<(), ClusterError>;

    /// Current lifecycle phase
    async fn phase(&self, pod: &PodRef) -> Result<PodPhase, ClusterError>;

    /// Run `command` through `sh -c` in the pod's container, capturing
    /// stdout and stderr together
    async fn exec(&self, pod: &PodRef, command: &str) -> Result<ExecutionResult, ClusterError>;

    /// Delete the pod
    async fn delete(&self, pod: &PodRef) -> Result<(), ClusterError>;
}
