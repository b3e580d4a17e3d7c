//! Read-cache end-to-end tests
//!
//! Black-box tests that run catalog cases against a real cluster with the
//! gcsfuse CSI driver installed, through the same executor the runtime uses.
//!
//! Test scenarios:
//! 1. Range-read case passes end to end
//! 2. Read-only case mounts `ro` and passes
//! 3. Same case twice gives the same verdict
//! 4. Small-TTL group passes as a suite
//! 5. Nothing the harness created is left behind

pub mod setup;

pub use setup::E2eEnv;
