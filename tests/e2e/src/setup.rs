//! Test environment setup

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use readcache_harness::k8s::MANAGED_BY_LABEL;
use readcache_harness::{
    CaseCatalog, CaseExecutor, HarnessConfig, KubePodClient, TestCase, TestNamespace, driver_for,
};
use std::sync::Arc;

/// A throwaway namespace plus an executor wired to the live cluster
pub struct E2eEnv {
    pub executor: CaseExecutor,
    pub catalog: CaseCatalog,
    client: kube::Client,
    namespace: TestNamespace,
}

impl E2eEnv {
    /// Connect with the ambient kubeconfig and create a test namespace
    ///
    /// Buckets and images follow the usual `READCACHE_*` variables.
    pub async fn setup() -> anyhow::Result<Self> {
        init_tracing();

        let config = HarnessConfig::from_env()?;
        let client = kube::Client::try_default().await?;
        let namespace = TestNamespace::create(client.clone()).await?;

        let executor = CaseExecutor::from_config(
            &config,
            namespace.name(),
            Arc::new(KubePodClient::new(client.clone())),
            driver_for(&config.bucket, &config.csi_driver),
        );

        Ok(Self {
            executor,
            catalog: CaseCatalog::read_cache(),
            client,
            namespace,
        })
    }

    /// Catalog case by name
    pub fn case(&self, name: &str) -> anyhow::Result<TestCase> {
        self.catalog
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no case named {name}"))
    }

    pub fn namespace(&self) -> &str {
        self.namespace.name()
    }

    /// Pods created by the harness that still exist in the namespace
    pub async fn leftover_pods(&self) -> anyhow::Result<Vec<String>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), self.namespace.name());
        let list = pods
            .list(&ListParams::default().labels(&format!("{MANAGED_BY_LABEL}=readcache-harness")))
            .await?;
        Ok(list
            .items
            .into_iter()
            // terminating pods are on their way out
            .filter(|p| p.metadata.deletion_timestamp.is_none())
            .filter_map(|p| p.metadata.name)
            .collect())
    }

    /// Delete the namespace
    pub async fn teardown(self) -> anyhow::Result<()> {
        self.namespace.delete().await?;
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}
