//! Workload pod description
//!
//! [`PodSpec`] is the cluster-agnostic description the harness builds for
//! every case. Cluster adapters translate it into their own API objects.

use serde::Serialize;
use std::collections::BTreeMap;

/// CPU, memory and ephemeral storage for the tester container
///
/// Values are Kubernetes quantities and are used for both requests and
/// limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resources {
    /// CPU quantity, e.g. `"1"`
    pub cpu: String,
    /// Memory quantity, e.g. `"2Gi"`
    pub memory: String,
    /// Ephemeral storage quantity
    pub ephemeral_storage: String,
}

impl Resources {
    /// Requests and limits of `cpu`, `memory` and `ephemeral_storage`
    pub fn new(
        cpu: impl Into<String>,
        memory: impl Into<String>,
        ephemeral_storage: impl Into<String>,
    ) -> Self {
        Self {
            cpu: cpu.into(),
            memory: memory.into(),
            ephemeral_storage: ephemeral_storage.into(),
        }
    }
}

/// Where a pod volume comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeSource {
    /// Scratch directory living as long as the pod
    EmptyDir,
    /// Inline CSI volume
    Csi {
        /// CSI driver name
        driver: String,
        /// Whether the driver publishes the volume read-only
        read_only: bool,
        /// Driver-specific volume attributes
        attributes: BTreeMap<String, String>,
    },
}

/// A named pod volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    /// Name mounts refer to
    pub name: String,
    /// Backing storage
    pub source: VolumeSource,
}

/// A volume mounted into the tester container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeMount {
    /// Name of the volume being mounted
    ///
    /// Usually one of [`PodSpec::volumes`]. A name not declared there is
    /// expected to be added to the pod at admission, e.g. by a sidecar
    /// injector.
    pub volume: String,
    /// Absolute path inside the container
    pub mount_path: String,
    /// Directory within the volume to mount instead of its root
    pub sub_path: Option<String>,
    /// Mount read-only in the container
    pub read_only: bool,
}

/// Addresses the tester container of a running pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PodRef {
    /// Namespace of the pod
    pub namespace: String,
    /// Pod name
    pub name: String,
    /// Container commands are executed in
    pub container: String,
}

impl std::fmt::Display for PodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Single-container workload description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodSpec {
    /// Pod name, unique within the namespace
    pub name: String,
    /// Namespace the pod is created in
    pub namespace: String,
    /// Name of the single container
    pub container: String,
    /// Container image
    pub image: String,
    /// Shell command the container runs (`sh -c <command>`)
    pub command: String,
    /// Requests and limits of the container
    pub resources: Resources,
    /// Volumes declared by the pod itself
    pub volumes: Vec<Volume>,
    /// Mounts of the container, in order
    pub mounts: Vec<VolumeMount>,
    /// Pod annotations
    pub annotations: BTreeMap<String, String>,
}

impl PodSpec {
    /// Reference used for exec and delete calls once the pod exists
    pub fn pod_ref(&self) -> PodRef {
        PodRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            container: self.container.clone(),
        }
    }

    /// Declared volume called `name`
    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name == name)
    }

    /// Volumes that are mounted but not declared, in mount order
    ///
    /// The pod only becomes schedulable once something else, typically an
    /// admission webhook, adds them.
    pub fn injected_volumes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for mount in &self.mounts {
            let name = mount.volume.as_str();
            if self.volume(name).is_none() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Mount at exactly `mount_path`
    pub fn mount_at(&self, mount_path: &str) -> Option<&VolumeMount> {
        self.mounts.iter().find(|m| m.mount_path == mount_path)
    }
}
