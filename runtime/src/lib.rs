//! readcache runtime - suite entry point
//!
//! Provides [`run()`] for running the configured suite against the current
//! cluster, and [`RuntimeBuilder`] for callers that need to override the
//! configuration or the case list.
//!
//! # Quick start
//!
//! ```ignore
//! use readcache_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let report = readcache_runtime::run().await?;
//!     println!("{} passed, {} failed", report.passed, report.failed);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use readcache_core::TestCase;
use readcache_harness::{
    CaseCatalog, CaseExecutor, HarnessConfig, KubePodClient, LogFormat, SuiteReport, SuiteRunner,
    TestNamespace, driver_for,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run the suite with configuration from the environment.
///
/// Loads [`HarnessConfig`], initialises tracing, connects to the cluster
/// from the ambient kubeconfig and runs every focused case. Ctrl+C, SIGTERM
/// or the suite deadline cancel the case in flight; its resources are
/// still released.
pub async fn run() -> anyhow::Result<SuiteReport> {
    RuntimeBuilder::new().run().await
}

/// Process exit code for a finished suite: success only if every case passed
pub fn exit_code(report: &SuiteReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Builder for overriding runtime behaviour.
///
/// # Example
///
/// ```ignore
/// let report = RuntimeBuilder::new()
///     .focus("TestReadOnlyTest")
///     .run()
///     .await?;
/// ```
pub struct RuntimeBuilder {
    config: Option<HarnessConfig>,
    focus: Option<String>,
    cases: Option<Vec<TestCase>>,
    init_tracing: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            focus: None,
            cases: None,
            init_tracing: true,
        }
    }

    /// Use `config` instead of reading the environment.
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override `READCACHE_FOCUS`.
    pub fn focus(mut self, filter: impl Into<String>) -> Self {
        self.focus = Some(filter.into());
        self
    }

    /// Run exactly these cases instead of the focused catalog.
    pub fn cases(mut self, cases: Vec<TestCase>) -> Self {
        self.cases = Some(cases);
        self
    }

    /// Leave the global subscriber alone, e.g. when the caller installed one.
    pub fn without_tracing(mut self) -> Self {
        self.init_tracing = false;
        self
    }

    /// Run the suite to completion and return its report.
    pub async fn run(self) -> anyhow::Result<SuiteReport> {
        // ── 1. Load config ───────────────────────────────────────
        let mut config = match self.config {
            Some(config) => config,
            None => HarnessConfig::from_env()?,
        };
        if let Some(focus) = self.focus {
            config.focus = focus;
        }

        // ── 2. Init tracing ──────────────────────────────────────
        if self.init_tracing {
            init_tracing(&config);
        }

        let cases = self
            .cases
            .unwrap_or_else(|| CaseCatalog::read_cache().focus(&config.focus));
        info!(
            cases = cases.len(),
            focus = %config.focus,
            image = %config.image,
            bucket = ?config.bucket,
            "Starting read-cache suite"
        );
        if cases.is_empty() {
            warn!(focus = %config.focus, "No cases selected");
        }

        // ── 3. Cluster + namespace ───────────────────────────────
        let client = kube::Client::try_default().await?;
        let (namespace, ephemeral) = match config.namespace.clone() {
            Some(namespace) => (namespace, None),
            None => {
                let created = TestNamespace::create(client.clone()).await?;
                (created.name().to_string(), Some(created))
            }
        };

        let executor = CaseExecutor::from_config(
            &config,
            namespace,
            Arc::new(KubePodClient::new(client)),
            driver_for(&config.bucket, &config.csi_driver),
        );

        // ── 4. Run with cancellation ─────────────────────────────
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_shutdown(cancel.clone(), config.suite_timeout));

        let report = SuiteRunner::new(executor).run(&cases, &cancel).await;
        watcher.abort();

        // ── 5. Teardown + report ─────────────────────────────────
        if let Some(namespace) = ephemeral {
            let name = namespace.name().to_string();
            if let Err(e) = namespace.delete().await {
                warn!(namespace = %name, error = %e, "Failed to delete test namespace");
            }
        }

        if let Some(path) = &config.report_path {
            report.write_json(path).await?;
            info!(path = %path.display(), "Report written");
        }

        info!(
            passed = report.passed,
            failed = report.failed,
            "Read-cache suite complete"
        );
        Ok(report)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialise the tracing subscriber based on config.
///
/// `RUST_LOG` wins over the configured level. A subscriber that is already
/// installed is kept.
fn init_tracing(config: &HarnessConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
}

/// Cancel `cancel` on Ctrl+C, SIGTERM or once `deadline` has passed.
async fn cancel_on_shutdown(cancel: CancellationToken, deadline: Option<Duration>) {
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = expired => warn!(?deadline, "Suite deadline reached, cancelling"),
    }
    cancel.cancel();
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, cancelling suite"),
        _ = terminate => info!("Received SIGTERM, cancelling suite"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels() {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_shutdown(
            cancel.clone(),
            Some(Duration::from_secs(600)),
        ));

        cancel.cancelled().await;
        assert!(cancel.is_cancelled());
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline_waits() {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_shutdown(cancel.clone(), None));

        tokio::time::sleep(Duration::from_secs(86_400)).await;
        assert!(!cancel.is_cancelled());
        watcher.abort();
    }
}
