//! Black-box E2E tests for the read-cache harness
//!
//! These tests run catalog cases against a real GKE cluster with the
//! gcsfuse CSI driver and verify the verdicts from the outside.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use readcache_e2e::E2eEnv;
use readcache_harness::{Phase, SuiteRunner};
use tokio_util::sync::CancellationToken;

/// Test 1: Range-read case → 2Gi pod, `rw,` mount, selector passes
#[tokio::test]
#[ignore] // Requires a cluster with the gcsfuse CSI driver
async fn test_range_read_case_passes() {
    let env = E2eEnv::setup().await.expect("Setup should succeed");
    let case = env.case("TestRangeReadTest-1").unwrap();

    let outcome = env.executor.run(&case, &CancellationToken::new()).await;

    assert!(outcome.passed(), "verdict: {:?}", outcome.verdict());
    assert_eq!(outcome.phase, Phase::ConformancePassed);
    env.teardown().await.unwrap();
}

/// Test 2: Read-only case → `ro,` mount asserted, selector passes
#[tokio::test]
#[ignore] // Requires a cluster with the gcsfuse CSI driver
async fn test_read_only_case_passes() {
    let env = E2eEnv::setup().await.expect("Setup should succeed");
    let case = env.case("TestReadOnlyTest-1").unwrap();
    assert!(case.is_read_only());

    let outcome = env.executor.run(&case, &CancellationToken::new()).await;

    assert!(outcome.passed(), "verdict: {:?}", outcome.verdict());
    env.teardown().await.unwrap();
}

/// Test 3: Running the same case twice gives the same verdict
#[tokio::test]
#[ignore] // Requires a cluster with the gcsfuse CSI driver
async fn test_case_is_idempotent() {
    let env = E2eEnv::setup().await.expect("Setup should succeed");
    let case = env.case("TestSmallCacheTTLTest-1").unwrap();
    let cancel = CancellationToken::new();

    let first = env.executor.run(&case, &cancel).await;
    let second = env.executor.run(&case, &cancel).await;

    assert_eq!(first.passed(), second.passed());
    assert_eq!(
        first.verdict().err().map(|e| e.kind()),
        second.verdict().err().map(|e| e.kind())
    );
    env.teardown().await.unwrap();
}

/// Test 4: Small-TTL group as a suite, in catalog order
#[tokio::test]
#[ignore] // Requires a cluster with the gcsfuse CSI driver
async fn test_small_ttl_suite_passes() {
    let env = E2eEnv::setup().await.expect("Setup should succeed");
    let cases = env.catalog.focus("TestSmallCacheTTLTest");
    assert_eq!(cases.len(), 2);

    let report = SuiteRunner::new(env.executor.clone())
        .run(&cases, &CancellationToken::new())
        .await;

    let failures: Vec<_> = report.failures().map(|c| c.name.clone()).collect();
    assert!(report.is_success(), "failed cases: {failures:?}");
    env.teardown().await.unwrap();
}

/// Test 5: No harness pod survives a case, pass or fail
#[tokio::test]
#[ignore] // Requires a cluster with the gcsfuse CSI driver
async fn test_no_pods_left_behind() {
    let env = E2eEnv::setup().await.expect("Setup should succeed");
    let case = env.case("TestCacheFileForRangeReadFalseTest-1").unwrap();

    let outcome = env.executor.run(&case, &CancellationToken::new()).await;
    assert!(outcome.cleanup.is_empty(), "cleanup: {}", outcome.cleanup);

    let leftover = env.leftover_pods().await.unwrap();
    assert!(
        leftover.is_empty(),
        "pods left in {}: {leftover:?}",
        env.namespace()
    );
    env.teardown().await.unwrap();
}

/// Test 6: A cancelled run fails as cancelled and still cleans up
#[tokio::test]
#[ignore] // Requires a cluster with the gcsfuse CSI driver
async fn test_cancelled_case_cleans_up() {
    let env = E2eEnv::setup().await.expect("Setup should succeed");
    let case = env.case("TestRangeReadTest-2").unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(20)).await;
        trigger.cancel();
    });

    let outcome = env.executor.run(&case, &cancel).await;

    assert_eq!(outcome.verdict().unwrap_err().kind(), "cancelled");
    assert!(env.leftover_pods().await.unwrap().is_empty());
    env.teardown().await.unwrap();
}
