//! Workload pod orchestration
//!
//! Builds the tester pod for a case, submits it and waits for it to run.
//! The pod keeps a `tail -F` on the FUSE log file as its main process so it
//! stays up for the exec calls that follow.

use crate::error::{CaseError, ClusterError};
use crate::provision::VolumeHandle;
use crate::scope::CaseScope;
use readcache_core::attribute_keys;
use readcache_core::pod::{Resources, Volume, VolumeMount, VolumeSource};
use readcache_core::{PodClient, PodPhase, PodRef, PodSpec, TestCase};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Name of the test volume inside the pod
pub const VOLUME_NAME: &str = "test-gcsfuse-volume";

/// Where the test volume is mounted in the tester container
pub const MOUNT_PATH: &str = "/mnt/test";

pub const TESTER_CONTAINER: &str = "volume-tester";

/// Tester-side view of the sidecar's temp directory, holding the FUSE log
pub const LOG_DIR: &str = "/tmp/gcsfuse_read_cache_test_logs";

/// Tester-side view of the file cache directory
pub const CACHE_DIR: &str = "/tmp/cache-dir";

/// Mount options every case gets, after its own
pub const LOGGING_MOUNT_OPTIONS: [&str; 2] = [
    "logging:file-path:/gcsfuse-tmp/log.json",
    "logging:format:json",
];

// Volumes the sidecar injector adds to the pod
const TMP_VOLUME: &str = "gke-gcsfuse-tmp";
const CACHE_VOLUME: &str = "gke-gcsfuse-cache";

const SIDECAR_ANNOTATIONS: [(&str, &str); 4] = [
    ("gke-gcsfuse/volumes", "true"),
    ("gke-gcsfuse/cpu-limit", "250m"),
    ("gke-gcsfuse/memory-limit", "256Mi"),
    ("gke-gcsfuse/ephemeral-storage-limit", "2Gi"),
];

/// Settings shared by every pod of a suite run
#[derive(Debug, Clone)]
pub struct PodSettings {
    pub namespace: String,
    pub image: String,
    pub start_timeout: Duration,
    pub poll_interval: Duration,
}

/// A submitted pod, owned by one case run
#[derive(Debug)]
pub struct PodHandle {
    pod: PodRef,
    spec: PodSpec,
}

impl PodHandle {
    pub fn pod_ref(&self) -> &PodRef {
        &self.pod
    }

    pub fn name(&self) -> &str {
        &self.pod.name
    }

    /// The spec the pod was created from
    pub fn spec(&self) -> &PodSpec {
        &self.spec
    }

    pub(crate) fn describe(&self) -> String {
        format!("pod/{}", self.pod.name)
    }
}

/// Creates, waits for and deletes tester pods
#[derive(Clone)]
pub struct WorkloadOrchestrator {
    client: Arc<dyn PodClient>,
    settings: PodSettings,
}

impl WorkloadOrchestrator {
    pub fn new(client: Arc<dyn PodClient>, settings: PodSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &Arc<dyn PodClient> {
        &self.client
    }

    /// Assemble the tester pod for `case` mounting `volume`
    pub fn build_spec(&self, case: &TestCase, volume: &VolumeHandle) -> PodSpec {
        let resources = if case.is_range_read() {
            Resources::new("1", "2Gi", "5Gi")
        } else {
            Resources::new("1", "1Gi", "5Gi")
        };

        let mut attributes = volume.attributes().to_map();
        attributes.insert(
            attribute_keys::MOUNT_OPTIONS.to_string(),
            mount_options(case).join(","),
        );

        // The sidecar injector adds the tmp and cache volumes; only their
        // mounts are declared here.
        let volumes = vec![Volume {
            name: VOLUME_NAME.to_string(),
            source: VolumeSource::Csi {
                driver: volume.csi_driver().to_string(),
                read_only: case.is_read_only(),
                attributes,
            },
        }];

        let mounts = vec![
            VolumeMount {
                volume: TMP_VOLUME.to_string(),
                mount_path: LOG_DIR.to_string(),
                sub_path: None,
                read_only: false,
            },
            VolumeMount {
                volume: CACHE_VOLUME.to_string(),
                mount_path: CACHE_DIR.to_string(),
                sub_path: Some(format!(".volumes/{VOLUME_NAME}")),
                read_only: false,
            },
            VolumeMount {
                volume: VOLUME_NAME.to_string(),
                mount_path: MOUNT_PATH.to_string(),
                sub_path: None,
                read_only: case.is_read_only(),
            },
        ];

        let annotations: BTreeMap<String, String> = SIDECAR_ANNOTATIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        PodSpec {
            name: pod_name(),
            namespace: self.settings.namespace.clone(),
            container: TESTER_CONTAINER.to_string(),
            image: self.settings.image.clone(),
            command: format!("tail -F {LOG_DIR}/log.json"),
            resources,
            volumes,
            mounts,
            annotations,
        }
    }

    /// Submit the tester pod for the scope's case and wait until it runs
    ///
    /// The pod handle is stored in the scope before the pod is submitted,
    /// so it is torn down on every path out of here, including when this
    /// future is dropped mid-way.
    ///
    /// Fails with [`CaseError::Deploy`] when the pod cannot be created,
    /// stops, or is not running within the start timeout.
    pub async fn deploy(&self, scope: &mut CaseScope) -> Result<(), CaseError> {
        let volume = scope
            .volume()
            .ok_or_else(|| CaseError::Deploy("no volume provisioned".to_string()))?;
        let spec = self.build_spec(scope.case(), volume);
        let pod = spec.pod_ref();

        info!(
            case = %scope.case().name(),
            pod = %pod,
            memory = %spec.resources.memory,
            read_only = scope.case().is_read_only(),
            "Deploying tester pod"
        );

        scope.attach_pod(PodHandle {
            pod: pod.clone(),
            spec: spec.clone(),
        });

        self.client
            .create(&spec)
            .await
            .map_err(|e| CaseError::Deploy(format!("creating pod {pod}: {e}")))?;

        self.wait_running(&pod).await
    }

    /// Poll until the pod is running
    async fn wait_running(&self, pod: &PodRef) -> Result<(), CaseError> {
        let deadline = Instant::now() + self.settings.start_timeout;
        let mut last_phase: Option<PodPhase> = None;

        loop {
            match self.client.phase(pod).await {
                Ok(PodPhase::Running) => {
                    info!(pod = %pod, "Tester pod running");
                    return Ok(());
                }
                Ok(phase) if phase.is_terminal() => {
                    return Err(CaseError::Deploy(format!(
                        "pod {pod} stopped in phase {phase:?} before running"
                    )));
                }
                Ok(phase) => {
                    if last_phase != Some(phase) {
                        debug!(pod = %pod, ?phase, "Waiting for tester pod");
                        last_phase = Some(phase);
                    }
                }
                Err(e) => warn!(pod = %pod, error = %e, "Failed to read pod phase"),
            }

            if Instant::now() >= deadline {
                return Err(CaseError::Deploy(format!(
                    "pod {pod} not running after {:?} (last phase {last_phase:?})",
                    self.settings.start_timeout
                )));
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Delete the pod
    ///
    /// Failures are logged here and handed back so the caller can record
    /// them with the other cleanup failures.
    pub async fn teardown(&self, pod: PodHandle) -> Result<(), ClusterError> {
        match self.client.delete(&pod.pod).await {
            Ok(()) => {
                debug!(pod = %pod.pod, "Tester pod deleted");
                Ok(())
            }
            Err(e) => {
                warn!(pod = %pod.pod, error = %e, "Failed to delete tester pod");
                Err(e)
            }
        }
    }
}

/// Case options followed by the fixed logging options
pub fn mount_options(case: &TestCase) -> Vec<String> {
    case.mount_options()
        .iter()
        .cloned()
        .chain(LOGGING_MOUNT_OPTIONS.iter().map(|o| o.to_string()))
        .collect()
}

fn pod_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("readcache-{}", &id[..8])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::provision::VolumeProvisioner;
    use async_trait::async_trait;
    use readcache_core::{
        DriverError, ExecutionResult, VolumeAttributes, VolumeDriver, VolumeResource,
    };

    struct Bucket;

    #[async_trait]
    impl VolumeDriver for Bucket {
        fn name(&self) -> &'static str {
            "bucket"
        }

        async fn create(&self, prefix: &str) -> Result<VolumeResource, DriverError> {
            let mut attributes = VolumeAttributes::new();
            attributes.insert("bucketName", "b-1");
            Ok(VolumeResource {
                id: prefix.to_string(),
                csi_driver: "gcsfuse.csi.storage.gke.io".to_string(),
                attributes,
            })
        }

        async fn delete(&self, _volume: &VolumeResource) -> Result<(), DriverError> {
            Ok(())
        }
    }

    /// Pod client whose pods report a fixed sequence of phases
    struct Phases(parking_lot::Mutex<Vec<PodPhase>>);

    #[async_trait]
    impl PodClient for Phases {
        fn name(&self) -> &'static str {
            "phases"
        }

        async fn create(&self, _spec: &PodSpec) -> Result<(), ClusterError> {
            Ok(())
        }

        async fn phase(&self, _pod: &PodRef) -> Result<PodPhase, ClusterError> {
            let mut phases = self.0.lock();
            if phases.len() > 1 {
                Ok(phases.remove(0))
            } else {
                Ok(phases[0])
            }
        }

        async fn exec(&self, _pod: &PodRef, _cmd: &str) -> Result<ExecutionResult, ClusterError> {
            Ok(ExecutionResult::new(0, ""))
        }

        async fn delete(&self, _pod: &PodRef) -> Result<(), ClusterError> {
            Ok(())
        }
    }

    fn orchestrator(phases: Vec<PodPhase>) -> WorkloadOrchestrator {
        WorkloadOrchestrator::new(
            Arc::new(Phases(parking_lot::Mutex::new(phases))),
            PodSettings {
                namespace: "ns".to_string(),
                image: "golang:1.22".to_string(),
                start_timeout: Duration::from_secs(10),
                poll_interval: Duration::from_secs(1),
            },
        )
    }

    async fn volume(case: &TestCase) -> VolumeHandle {
        VolumeProvisioner::new(Arc::new(Bucket))
            .provision(case)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_range_read_pod_shape() {
        let case = TestCase::new(
            "TestRangeReadTest-1",
            "TestRangeReadTest/TestRangeReadsWithinReadChunkSize",
        )
        .cache_capacity("500Mi");
        let spec = orchestrator(vec![PodPhase::Running]).build_spec(&case, &volume(&case).await);

        assert_eq!(spec.resources, Resources::new("1", "2Gi", "5Gi"));
        assert_eq!(spec.container, TESTER_CONTAINER);
        assert_eq!(spec.namespace, "ns");
        assert!(spec.name.starts_with("readcache-"));
        assert_eq!(spec.command, "tail -F /tmp/gcsfuse_read_cache_test_logs/log.json");

        let test_mount = spec.mount_at(MOUNT_PATH).unwrap();
        assert_eq!(test_mount.volume, VOLUME_NAME);
        assert!(!test_mount.read_only);

        let cache_mount = spec.mount_at(CACHE_DIR).unwrap();
        assert_eq!(
            cache_mount.sub_path.as_deref(),
            Some(".volumes/test-gcsfuse-volume")
        );
        assert!(spec.mount_at(LOG_DIR).is_some());
        assert_eq!(spec.mounts.len(), 3);
    }

    #[tokio::test]
    async fn test_sidecar_volumes_are_mounted_not_declared() {
        let case = TestCase::new("TestReadOnlyTest-1", "TestReadOnlyTest/TestX").read_only(true);
        let spec = orchestrator(vec![PodPhase::Running]).build_spec(&case, &volume(&case).await);

        let declared: Vec<&str> = spec.volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(declared, vec![VOLUME_NAME]);
        assert!(spec.volume(TMP_VOLUME).is_none());
        assert!(spec.volume(CACHE_VOLUME).is_none());

        assert_eq!(spec.mount_at(LOG_DIR).unwrap().volume, TMP_VOLUME);
        assert_eq!(spec.mount_at(CACHE_DIR).unwrap().volume, CACHE_VOLUME);
        assert_eq!(spec.injected_volumes(), vec![TMP_VOLUME, CACHE_VOLUME]);
        assert_eq!(spec.annotations["gke-gcsfuse/volumes"], "true");
    }

    #[tokio::test]
    async fn test_default_pod_memory() {
        let case = TestCase::new("TestReadOnlyTest-1", "TestReadOnlyTest/TestX").read_only(true);
        let spec = orchestrator(vec![PodPhase::Running]).build_spec(&case, &volume(&case).await);
        assert_eq!(spec.resources.memory, "1Gi");
        assert!(spec.mount_at(MOUNT_PATH).unwrap().read_only);
    }

    #[tokio::test]
    async fn test_csi_volume_carries_attributes_and_mount_options() {
        let case = TestCase::new("c-1", "TestSmallCacheTTLTest/TestX")
            .cache_capacity("9Mi")
            .ttl_secs(10)
            .mount_option("implicit-dirs");
        let spec = orchestrator(vec![PodPhase::Running]).build_spec(&case, &volume(&case).await);

        let VolumeSource::Csi {
            driver,
            read_only,
            attributes,
        } = &spec.volume(VOLUME_NAME).unwrap().source
        else {
            panic!("test volume is not a CSI volume");
        };
        assert_eq!(driver, "gcsfuse.csi.storage.gke.io");
        assert!(!read_only);
        assert_eq!(attributes["bucketName"], "b-1");
        assert_eq!(attributes["fileCacheCapacity"], "9Mi");
        assert_eq!(attributes["metadataCacheTTLSeconds"], "10");
        assert_eq!(
            attributes["mountOptions"],
            "implicit-dirs,logging:file-path:/gcsfuse-tmp/log.json,logging:format:json"
        );
    }

    #[tokio::test]
    async fn test_sidecar_annotations() {
        let case = TestCase::new("c-1", "T/x");
        let spec = orchestrator(vec![PodPhase::Running]).build_spec(&case, &volume(&case).await);
        assert_eq!(spec.annotations["gke-gcsfuse/volumes"], "true");
        assert_eq!(spec.annotations["gke-gcsfuse/cpu-limit"], "250m");
        assert_eq!(spec.annotations["gke-gcsfuse/memory-limit"], "256Mi");
        assert_eq!(spec.annotations["gke-gcsfuse/ephemeral-storage-limit"], "2Gi");
    }

    #[test]
    fn test_logging_options_are_appended_last() {
        let case = TestCase::new("c", "T/x").mount_option("a").mount_option("b");
        assert_eq!(
            mount_options(&case),
            [
                "a",
                "b",
                "logging:file-path:/gcsfuse-tmp/log.json",
                "logging:format:json"
            ]
        );
        assert_eq!(mount_options(&TestCase::new("c", "T/x")).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_waits_through_pending() {
        let orchestrator =
            orchestrator(vec![PodPhase::Pending, PodPhase::Pending, PodPhase::Running]);
        let case = TestCase::new("c-1", "T/x");
        let mut scope = CaseScope::new(case.clone());
        scope.attach_volume(volume(&case).await);

        orchestrator.deploy(&mut scope).await.unwrap();
        assert!(scope.pod().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_fails_when_pod_stops() {
        let orchestrator = orchestrator(vec![PodPhase::Pending, PodPhase::Failed]);
        let case = TestCase::new("c-1", "T/x");
        let mut scope = CaseScope::new(case.clone());
        scope.attach_volume(volume(&case).await);

        let err = orchestrator.deploy(&mut scope).await.unwrap_err();
        assert!(matches!(err, CaseError::Deploy(msg) if msg.contains("Failed")));
        // still attached so cleanup removes it
        assert!(scope.pod().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_times_out() {
        let orchestrator = orchestrator(vec![PodPhase::Pending]);
        let case = TestCase::new("c-1", "T/x");
        let mut scope = CaseScope::new(case.clone());
        scope.attach_volume(volume(&case).await);

        let err = orchestrator.deploy(&mut scope).await.unwrap_err();
        assert!(matches!(err, CaseError::Deploy(msg) if msg.contains("not running")));
    }
}
