//! Per-case execution record
//!
//! A [`CaseScope`] owns everything one case run acquires. Resources go in
//! volume first, pod second, and [`CaseScope::close`] releases them in the
//! reverse order: the pod references the volume, so it must go first.

use crate::error::CleanupError;
use crate::orchestrate::{PodHandle, WorkloadOrchestrator};
use crate::provision::{VolumeHandle, VolumeProvisioner};
use readcache_core::{Phase, TestCase};
use tracing::error;

/// Resources and progress of one case run
#[derive(Debug)]
pub struct CaseScope {
    case: TestCase,
    phase: Phase,
    volume: Option<VolumeHandle>,
    pod: Option<PodHandle>,
    /// Resources given up on before the scope could own them
    abandoned: CleanupError,
}

impl CaseScope {
    pub fn new(case: TestCase) -> Self {
        Self {
            case,
            phase: Phase::Init,
            volume: None,
            pod: None,
            abandoned: CleanupError::new(),
        }
    }

    pub fn case(&self) -> &TestCase {
        &self.case
    }

    /// Furthest phase reached so far
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn volume(&self) -> Option<&VolumeHandle> {
        self.volume.as_ref()
    }

    pub fn pod(&self) -> Option<&PodHandle> {
        self.pod.as_ref()
    }

    pub(crate) fn advance(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase, "phases only move forward");
        self.phase = phase;
    }

    /// Take ownership of a provisioned volume
    pub fn attach_volume(&mut self, volume: VolumeHandle) {
        self.volume = Some(volume);
        self.phase = self.phase.max(Phase::Provisioned);
    }

    /// Take ownership of a pod, before it is submitted
    pub fn attach_pod(&mut self, pod: PodHandle) {
        self.pod = Some(pod);
    }

    /// Record a resource that may exist but will never be attached
    ///
    /// It is reported with the cleanup failures on [`close`](Self::close).
    pub fn abandon(&mut self, resource: impl Into<String>, message: impl Into<String>) {
        let resource = resource.into();
        error!(case = %self.case.name(), %resource, "Resource abandoned");
        self.abandoned.push(resource, message);
    }

    /// Release pod then volume, collecting every failure
    pub async fn close(
        mut self,
        orchestrator: &WorkloadOrchestrator,
        provisioner: &VolumeProvisioner,
    ) -> CleanupError {
        let mut errors = std::mem::take(&mut self.abandoned);

        if let Some(pod) = self.pod.take() {
            let resource = pod.describe();
            if let Err(e) = orchestrator.teardown(pod).await {
                errors.push(resource, e.to_string());
            }
        }
        if let Some(volume) = self.volume.take() {
            provisioner.release(volume, &mut errors).await;
        }

        self.phase = Phase::CleanedUp;
        errors
    }
}

impl Drop for CaseScope {
    fn drop(&mut self) {
        if self.pod.is_some() || self.volume.is_some() {
            error!(
                case = %self.case.name(),
                pod = ?self.pod.as_ref().map(PodHandle::name),
                volume = ?self.volume.as_ref().map(|v| v.resource().id.as_str()),
                "Case scope dropped without cleanup, resources leaked"
            );
        }
    }
}
