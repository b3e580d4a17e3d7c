//! Case executor
//!
//! Runs one case through the state machine
//!
//! ```text
//! Init ─► Provisioned ─► Deployed ─► MountVerified ─► ConformancePassed ─► CleanedUp
//!   │          │             │              │
//!   └──────────┴─────────────┴──────────────┴──► Failed ──► CleanedUp
//! ```
//!
//! The first failure along the happy path is the verdict. Whatever was
//! acquired is released afterwards in every case, pod first, then volume.
//! Cleanup failures are kept with the outcome and only become the verdict
//! when everything else passed.

use crate::config::HarnessConfig;
use crate::conformance::ConformanceRunner;
use crate::error::{CaseError, CleanupError};
use crate::orchestrate::{MOUNT_PATH, PodSettings, WorkloadOrchestrator};
use crate::provision::{VolumeHandle, VolumeProvisioner};
use crate::scope::CaseScope;
use crate::verify::MountVerifier;
use readcache_core::{ExecutionResult, Phase, PodClient, TestCase, VolumeDriver};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

/// Result of one case run
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub case: String,
    pub selector: String,
    /// Furthest phase reached before cleanup
    pub phase: Phase,
    /// First failure on the happy path
    pub error: Option<CaseError>,
    /// Everything that could not be released
    pub cleanup: CleanupError,
    /// Conformance output of a passing run
    pub output: Option<String>,
    pub elapsed: Duration,
}

impl CaseOutcome {
    /// Final verdict: the happy-path failure if there was one, otherwise
    /// the cleanup failures, otherwise a pass
    pub fn verdict(&self) -> Result<(), CaseError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => self.cleanup.clone().into_result().map_err(CaseError::Cleanup),
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none() && self.cleanup.is_empty()
    }
}

/// Composes the phase components into a full case run
#[derive(Clone)]
pub struct CaseExecutor {
    provisioner: VolumeProvisioner,
    orchestrator: WorkloadOrchestrator,
    verifier: MountVerifier,
    conformance: ConformanceRunner,
    cleanup_timeout: Duration,
}

impl CaseExecutor {
    pub fn new(
        provisioner: VolumeProvisioner,
        orchestrator: WorkloadOrchestrator,
        verifier: MountVerifier,
        conformance: ConformanceRunner,
    ) -> Self {
        Self {
            provisioner,
            orchestrator,
            verifier,
            conformance,
            cleanup_timeout: Duration::from_secs(120),
        }
    }

    /// Wire the phase components from configuration
    ///
    /// Pods go to `namespace`; `client` and `driver` are shared by every
    /// case the executor runs.
    pub fn from_config(
        config: &HarnessConfig,
        namespace: impl Into<String>,
        client: Arc<dyn PodClient>,
        driver: Arc<dyn VolumeDriver>,
    ) -> Self {
        let settings = PodSettings {
            namespace: namespace.into(),
            image: config.image.clone(),
            start_timeout: config.pod_start_timeout,
            poll_interval: config.poll_interval,
        };
        Self::new(
            VolumeProvisioner::new(driver),
            WorkloadOrchestrator::new(client.clone(), settings),
            MountVerifier::new(client.clone()),
            ConformanceRunner::new(client, config.conformance_repo.clone()),
        )
        .cleanup_timeout(config.cleanup_timeout)
    }

    /// Upper bound for releasing one case's resources
    pub fn cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    /// Run `case` to completion
    ///
    /// Cancelling `cancel` aborts the step in flight and fails the case
    /// with [`CaseError::Cancelled`]; resources are still released.
    pub async fn run(&self, case: &TestCase, cancel: &CancellationToken) -> CaseOutcome {
        let span = info_span!("case", case = %case.name());
        self.run_inner(case, cancel).instrument(span).await
    }

    async fn run_inner(&self, case: &TestCase, cancel: &CancellationToken) -> CaseOutcome {
        let start = Instant::now();
        info!(selector = %case.selector(), "Case started");

        let mut scope = CaseScope::new(case.clone());
        let result = self.run_phases(&mut scope, cancel).await;
        let phase = scope.phase();
        let cleanup = self.close(scope).await;

        let (error, output) = match result {
            Ok(result) => (None, Some(result.output)),
            Err(err) => (Some(err), None),
        };
        let outcome = CaseOutcome {
            case: case.name().to_string(),
            selector: case.selector().to_string(),
            phase,
            error,
            cleanup,
            output,
            elapsed: start.elapsed(),
        };

        match outcome.verdict() {
            Ok(()) => info!(elapsed = ?outcome.elapsed, "Case passed"),
            Err(err) => error!(
                %phase,
                kind = err.kind(),
                error = %err,
                output = err.output().unwrap_or_default(),
                "Case failed"
            ),
        }
        if outcome.error.is_some() && !outcome.cleanup.is_empty() {
            warn!(cleanup = %outcome.cleanup, "Cleanup also failed");
        }
        outcome
    }

    /// The happy path; stops at the first failure
    async fn run_phases(
        &self,
        scope: &mut CaseScope,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, CaseError> {
        self.provision(scope, cancel).await?;

        cancellable(cancel, Phase::Provisioned, self.orchestrator.deploy(scope)).await?;
        scope.advance(Phase::Deployed);

        {
            let pod = scope
                .pod()
                .ok_or_else(|| CaseError::Deploy("no pod attached".to_string()))?;
            let read_only = scope.case().is_read_only();
            cancellable(
                cancel,
                Phase::Deployed,
                self.verifier.assert_mount_mode(pod, MOUNT_PATH, read_only),
            )
            .await?;
        }
        scope.advance(Phase::MountVerified);

        let result = {
            let (Some(pod), Some(volume)) = (scope.pod(), scope.volume()) else {
                return Err(CaseError::Deploy("no pod attached".to_string()));
            };
            cancellable(
                cancel,
                Phase::MountVerified,
                self.conformance
                    .run(pod, scope.case(), MOUNT_PATH, volume.bucket_name()),
            )
            .await?
        };
        scope.advance(Phase::ConformancePassed);

        Ok(result)
    }

    /// Provision the case's volume unless `cancel` fires first
    ///
    /// The driver call runs on its own task so a hung allocation cannot hold
    /// the case past cancellation. A volume that still arrives within
    /// `cleanup_timeout` is handed to the scope and released with the rest.
    /// Otherwise the task is aborted and the allocation is recorded as a
    /// cleanup failure.
    async fn provision(
        &self,
        scope: &mut CaseScope,
        cancel: &CancellationToken,
    ) -> Result<(), CaseError> {
        if cancel.is_cancelled() {
            return Err(CaseError::Cancelled { phase: Phase::Init });
        }

        let provisioner = self.provisioner.clone();
        let case = scope.case().clone();
        let mut task = tokio::spawn(async move { provisioner.provision(&case).await });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            joined = &mut task => {
                scope.attach_volume(provisioned(joined)?);
                return Ok(());
            }
        }

        warn!(timeout = ?self.cleanup_timeout, "Cancelled while provisioning, waiting for the driver");
        match tokio::time::timeout(self.cleanup_timeout, &mut task).await {
            Ok(joined) => {
                if let Ok(volume) = provisioned(joined) {
                    info!(volume = %volume.resource().id, "Late volume taken for release");
                    scope.attach_volume(volume);
                }
            }
            Err(_) => {
                task.abort();
                let resource = format!("volume/{}", scope.case().name());
                scope.abandon(
                    resource,
                    format!(
                        "allocation still pending {:?} after cancellation",
                        self.cleanup_timeout
                    ),
                );
            }
        }
        Err(CaseError::Cancelled { phase: Phase::Init })
    }

    async fn close(&self, scope: CaseScope) -> CleanupError {
        let name = scope.case().name().to_string();
        let close = scope.close(&self.orchestrator, &self.provisioner);
        match tokio::time::timeout(self.cleanup_timeout, close).await {
            Ok(errors) => errors,
            Err(_) => {
                let mut errors = CleanupError::new();
                errors.push(
                    format!("case/{name}"),
                    format!("cleanup did not finish within {:?}", self.cleanup_timeout),
                );
                errors
            }
        }
    }
}

fn provisioned(
    joined: Result<Result<VolumeHandle, CaseError>, JoinError>,
) -> Result<VolumeHandle, CaseError> {
    joined.map_err(|e| CaseError::Provision(format!("provisioning task failed: {e}")))?
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<T, F>(cancel: &CancellationToken, phase: Phase, fut: F) -> Result<T, CaseError>
where
    F: Future<Output = Result<T, CaseError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CaseError::Cancelled { phase }),
        res = fut => res,
    }
}
