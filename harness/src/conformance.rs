//! External conformance test invocation
//!
//! Clones the integration-test sources into the tester pod and runs the
//! read-cache package against the live mount, scoped to one sub-test.

use crate::error::CaseError;
use crate::orchestrate::PodHandle;
use readcache_core::{ExecutionResult, Phase, PodClient, TestCase};
use std::sync::Arc;
use tracing::{debug, info};

/// Package holding the read-cache tests, relative to the clone
const READ_CACHE_PACKAGE: &str = "tools/integration_tests/read_cache";

/// Runs the conformance binary inside tester pods
#[derive(Clone)]
pub struct ConformanceRunner {
    client: Arc<dyn PodClient>,
    repo_url: String,
}

impl ConformanceRunner {
    pub fn new(client: Arc<dyn PodClient>, repo_url: impl Into<String>) -> Self {
        Self {
            client,
            repo_url: repo_url.into(),
        }
    }

    /// Fetch the sources and run `case`'s sub-test against `mount_path`
    ///
    /// Fails with [`CaseError::SourceFetch`] when the clone fails and with
    /// [`CaseError::Conformance`] when the test exits non-zero. Both keep
    /// the full command output.
    pub async fn run(
        &self,
        pod: &PodHandle,
        case: &TestCase,
        mount_path: &str,
        bucket: &str,
    ) -> Result<ExecutionResult, CaseError> {
        let clone = self.exec(pod, &clone_command(&self.repo_url)).await?;
        if !clone.success() {
            return Err(CaseError::SourceFetch {
                exit_code: clone.exit_code,
                output: clone.output,
            });
        }
        debug!(pod = %pod.name(), repo = %self.repo_url, "Conformance sources cloned");

        let command = test_command(&clone_dir(&self.repo_url), mount_path, bucket, case.selector());
        info!(pod = %pod.name(), selector = %case.selector(), bucket, "Running conformance test");

        let result = self.exec(pod, &command).await?;
        if !result.success() {
            return Err(CaseError::Conformance {
                exit_code: result.exit_code,
                output: result.output,
            });
        }
        Ok(result)
    }

    async fn exec(&self, pod: &PodHandle, command: &str) -> Result<ExecutionResult, CaseError> {
        self.client
            .exec(pod.pod_ref(), command)
            .await
            .map_err(|source| CaseError::Cluster {
                phase: Phase::MountVerified,
                source,
            })
    }
}

pub fn clone_command(repo_url: &str) -> String {
    format!("git clone {repo_url}")
}

/// Directory `git clone` creates for `repo_url`
pub fn clone_dir(repo_url: &str) -> String {
    let last = repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(repo_url);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// The `go test` invocation for one sub-test
///
/// Runs with a single worker and with async preemption off so cache timing
/// assertions see a quiet runtime.
pub fn test_command(clone_dir: &str, mount_path: &str, bucket: &str, selector: &str) -> String {
    format!(
        "export PATH=$PATH:/usr/local/go/bin && cd {clone_dir}/{READ_CACHE_PACKAGE} && \
         GODEBUG=asyncpreemptoff=1 go test . -p 1 --integrationTest -v \
         --mountedDirectory={mount_path} --testbucket={bucket} -run {selector}"
    )
}
