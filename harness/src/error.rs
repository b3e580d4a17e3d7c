//! Error types for the harness

use thiserror::Error;

// Re-export the per-case taxonomy from readcache-core
pub use readcache_core::{CaseError, CleanupError, ClusterError, DriverError};

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that stop the harness itself, as opposed to failing a case
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Kubernetes client error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Cluster call failed outside of a case
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
