//! Kubernetes pod client
//!
//! [`KubePodClient`] implements [`PodClient`] on top of the kube API and
//! [`TestNamespace`] gives a suite run its own privileged namespace. The
//! FUSE sidecar needs privileged pod security, which most default
//! namespaces do not grant.

use crate::error::{ClusterError, HarnessError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    CSIVolumeSource, Container, EmptyDirVolumeSource, Namespace, Pod, PodSpec as K8sPodSpec,
    ResourceRequirements, Volume as K8sVolume, VolumeMount as K8sVolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Status};
use kube::api::{Api, AttachParams, DeleteParams, PostParams};
use kube::Client;
use readcache_core::pod::VolumeSource;
use readcache_core::{ExecutionResult, PodClient, PodPhase, PodRef, PodSpec};
use std::collections::BTreeMap;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Label granting privileged pod security to a namespace
pub const POD_SECURITY_LABEL: &str = "pod-security.kubernetes.io/enforce";

/// Marks objects created by the harness
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const MANAGED_BY: &str = "readcache-harness";

/// [`PodClient`] backed by a kube [`Client`]
#[derive(Clone)]
pub struct KubePodClient {
    client: Client,
}

impl KubePodClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl PodClient for KubePodClient {
    fn name(&self) -> &'static str {
        "kube"
    }

    async fn create(&self, spec: &PodSpec) -> Result<(), ClusterError> {
        let pod = to_pod(spec);
        self.pods(&spec.namespace)
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| ClusterError::Api(format!("create pod {}: {e}", spec.pod_ref())))?;
        debug!(pod = %spec.pod_ref(), "Pod submitted");
        Ok(())
    }

    async fn phase(&self, pod: &PodRef) -> Result<PodPhase, ClusterError> {
        let current = self
            .pods(&pod.namespace)
            .get(&pod.name)
            .await
            .map_err(|e| ClusterError::Api(format!("get pod {pod}: {e}")))?;
        Ok(current
            .status
            .and_then(|s| s.phase)
            .map(|p| PodPhase::parse(&p))
            .unwrap_or(PodPhase::Pending))
    }

    async fn exec(&self, pod: &PodRef, command: &str) -> Result<ExecutionResult, ClusterError> {
        // stderr is folded into stdout by the shell so output keeps its order
        let wrapped = format!("exec 2>&1; {command}");
        let params = AttachParams::default()
            .container(pod.container.clone())
            .stdin(false)
            .stdout(true)
            .stderr(false);

        let mut attached = self
            .pods(&pod.namespace)
            .exec(&pod.name, ["sh", "-c", wrapped.as_str()], &params)
            .await
            .map_err(|e| ClusterError::Exec(format!("exec in {pod}: {e}")))?;

        let mut stdout = attached
            .stdout()
            .ok_or_else(|| ClusterError::Exec(format!("no stdout stream from {pod}")))?;
        let status = attached
            .take_status()
            .ok_or_else(|| ClusterError::Exec(format!("no status channel from {pod}")))?;

        let mut raw = Vec::new();
        stdout
            .read_to_end(&mut raw)
            .await
            .map_err(|e| ClusterError::Exec(format!("reading output from {pod}: {e}")))?;
        let status = status.await;
        if let Err(e) = attached.join().await {
            warn!(pod = %pod, error = %e, "Exec session did not close cleanly");
        }

        let exit_code = exit_code(status.as_ref())
            .ok_or_else(|| ClusterError::Exec(format!("no exit status from {pod}")))?;
        Ok(ExecutionResult::new(
            exit_code,
            String::from_utf8_lossy(&raw).into_owned(),
        ))
    }

    async fn delete(&self, pod: &PodRef) -> Result<(), ClusterError> {
        match self
            .pods(&pod.namespace)
            .delete(&pod.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!(pod = %pod, "Pod already gone");
                Ok(())
            }
            Err(e) => Err(ClusterError::Api(format!("delete pod {pod}: {e}"))),
        }
    }
}

/// Exit code carried by an exec status
///
/// `Success` is 0. Failures carry the code as an `ExitCode` cause; a
/// failure without one is reported as 1.
pub fn exit_code(status: Option<&Status>) -> Option<i32> {
    let status = status?;
    if status.status.as_deref() == Some("Success") {
        return Some(0);
    }
    let code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.trim().parse().ok());
    Some(code.unwrap_or(1))
}

/// Translate the harness pod description into a Kubernetes pod
///
/// Mounts are passed through even when they name a volume the spec does not
/// declare; the sidecar injector adds those volumes at admission.
pub fn to_pod(spec: &PodSpec) -> Pod {
    let quantities: BTreeMap<String, Quantity> = [
        ("cpu", &spec.resources.cpu),
        ("memory", &spec.resources.memory),
        ("ephemeral-storage", &spec.resources.ephemeral_storage),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Quantity(v.clone())))
    .collect();

    let volumes = spec
        .volumes
        .iter()
        .map(|v| match &v.source {
            VolumeSource::EmptyDir => K8sVolume {
                name: v.name.clone(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
            VolumeSource::Csi {
                driver,
                read_only,
                attributes,
            } => K8sVolume {
                name: v.name.clone(),
                csi: Some(CSIVolumeSource {
                    driver: driver.clone(),
                    read_only: Some(*read_only),
                    volume_attributes: Some(attributes.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        })
        .collect();

    let mounts = spec
        .mounts
        .iter()
        .map(|m| K8sVolumeMount {
            name: m.volume.clone(),
            mount_path: m.mount_path.clone(),
            sub_path: m.sub_path.clone(),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            annotations: Some(spec.annotations.clone()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                MANAGED_BY.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(K8sPodSpec {
            containers: vec![Container {
                name: spec.container.clone(),
                image: Some(spec.image.clone()),
                command: Some(vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    spec.command.clone(),
                ]),
                resources: Some(ResourceRequirements {
                    requests: Some(quantities.clone()),
                    limits: Some(quantities),
                    ..Default::default()
                }),
                volume_mounts: Some(mounts),
                ..Default::default()
            }],
            volumes: Some(volumes),
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A namespace created for one suite run
pub struct TestNamespace {
    client: Client,
    name: String,
}

impl TestNamespace {
    /// Create `readcache-<id>` with privileged pod security
    pub async fn create(client: Client) -> Result<Self, HarnessError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("readcache-{}", &id[..8]);

        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(BTreeMap::from([
                    (POD_SECURITY_LABEL.to_string(), "privileged".to_string()),
                    (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
                ])),
                ..Default::default()
            },
            ..Default::default()
        };

        Api::<Namespace>::all(client.clone())
            .create(&PostParams::default(), &namespace)
            .await?;
        info!(namespace = %name, "Test namespace created");
        Ok(Self { client, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delete the namespace and everything left in it
    pub async fn delete(self) -> Result<(), HarnessError> {
        match Api::<Namespace>::all(self.client.clone())
            .delete(&self.name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!(namespace = %self.name, "Test namespace deleted");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
