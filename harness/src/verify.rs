//! Mount access-mode check

use crate::error::CaseError;
use crate::orchestrate::PodHandle;
use readcache_core::{Phase, PodClient};
use std::sync::Arc;
use tracing::info;

/// Checks the live mount table inside the tester pod
#[derive(Clone)]
pub struct MountVerifier {
    client: Arc<dyn PodClient>,
}

impl MountVerifier {
    pub fn new(client: Arc<dyn PodClient>) -> Self {
        Self { client }
    }

    /// Assert `mount_path` is mounted `ro` when `read_only`, `rw` otherwise
    ///
    /// Fails with [`CaseError::MountAssertion`] when no mount line carries
    /// the expected token.
    pub async fn assert_mount_mode(
        &self,
        pod: &PodHandle,
        mount_path: &str,
        read_only: bool,
    ) -> Result<(), CaseError> {
        let expected = if read_only { "ro," } else { "rw," };
        let command = mount_check_command(mount_path, expected);

        let result = self
            .client
            .exec(pod.pod_ref(), &command)
            .await
            .map_err(|source| CaseError::Cluster {
                phase: Phase::Deployed,
                source,
            })?;

        if !result.success() {
            return Err(CaseError::MountAssertion {
                mount_path: mount_path.to_string(),
                expected: expected.to_string(),
                exit_code: result.exit_code,
                output: result.output,
            });
        }

        info!(pod = %pod.name(), mount_path, mode = expected, "Mount mode verified");
        Ok(())
    }
}

/// `mount | grep <path> | grep <token>`: exits non-zero unless a line matches
pub fn mount_check_command(mount_path: &str, token: &str) -> String {
    format!("mount | grep {mount_path} | grep {token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_check_command() {
        assert_eq!(
            mount_check_command("/mnt/test", "ro,"),
            "mount | grep /mnt/test | grep ro,"
        );
        assert_eq!(
            mount_check_command("/mnt/test", "rw,"),
            "mount | grep /mnt/test | grep rw,"
        );
    }
}
