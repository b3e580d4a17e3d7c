//! `readcache` - runs the read-cache conformance suite
//!
//! Configuration comes from `READCACHE_*` environment variables. Exits 0
//! when every selected case passed, 1 otherwise.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let report = readcache_runtime::run().await?;

    for case in report.failures() {
        eprintln!(
            "FAIL {} ({}): {}",
            case.name,
            case.selector,
            case.error.as_deref().unwrap_or("unknown")
        );
    }
    Ok(readcache_runtime::exit_code(&report))
}
