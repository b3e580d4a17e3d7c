//! Suite runner and report
//!
//! Cases run one after another against a single executor. Nothing runs in
//! parallel: every case expects a cache directory it owns exclusively.

use crate::error::Result;
use crate::executor::{CaseExecutor, CaseOutcome};
use readcache_core::{Phase, TestCase};
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serializable summary of one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub selector: String,
    pub passed: bool,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_failures: Vec<String>,
    pub elapsed_ms: u64,
}

impl From<&CaseOutcome> for CaseReport {
    fn from(outcome: &CaseOutcome) -> Self {
        let verdict = outcome.verdict().err();
        let output = verdict
            .as_ref()
            .and_then(|e| e.output().map(str::to_string))
            .or_else(|| outcome.output.clone());
        Self {
            name: outcome.case.clone(),
            selector: outcome.selector.clone(),
            passed: verdict.is_none(),
            phase: outcome.phase,
            error_kind: verdict.as_ref().map(|e| e.kind()),
            error: verdict.as_ref().map(ToString::to_string),
            output,
            cleanup_failures: outcome
                .cleanup
                .failures()
                .iter()
                .map(ToString::to_string)
                .collect(),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        }
    }
}

/// Outcome of a whole suite run, in case order
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub passed: usize,
    pub failed: usize,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn push(&mut self, outcome: &CaseOutcome) {
        let report = CaseReport::from(outcome);
        if report.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.cases.push(report);
    }

    /// True when every case passed; an empty suite passes
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| !c.passed)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.to_json()?).await?;
        Ok(())
    }
}

/// Runs a list of cases through one [`CaseExecutor`]
#[derive(Clone)]
pub struct SuiteRunner {
    executor: CaseExecutor,
}

impl SuiteRunner {
    pub fn new(executor: CaseExecutor) -> Self {
        Self { executor }
    }

    /// Run every case in order
    ///
    /// Once `cancel` fires the remaining cases fail as cancelled without
    /// acquiring anything, so the report still lists every case.
    pub async fn run(&self, cases: &[TestCase], cancel: &CancellationToken) -> SuiteReport {
        let mut report = SuiteReport::default();
        info!(cases = cases.len(), "Suite started");

        for (i, case) in cases.iter().enumerate() {
            info!(case = %case.name(), index = i + 1, total = cases.len(), "Running case");
            let outcome = self.executor.run(case, cancel).await;
            report.push(&outcome);
        }

        info!(passed = report.passed, failed = report.failed, "Suite finished");
        report
    }
}
