//! Case execution phases

use serde::Serialize;
use std::fmt;

/// Furthest point a case run reached
///
/// ```text
/// Init ─► Provisioned ─► Deployed ─► MountVerified ─► ConformancePassed ─► CleanedUp
/// ```
///
/// Phases are ordered, so `phase >= Phase::Provisioned` means resources
/// were acquired and must be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing acquired yet
    Init,
    /// The volume is allocated and configured
    Provisioned,
    /// The tester pod is running
    Deployed,
    /// The volume is mounted with the requested access mode
    MountVerified,
    /// The conformance sub-test passed
    ConformancePassed,
    /// Everything acquired has been released
    CleanedUp,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "init",
            Phase::Provisioned => "provisioned",
            Phase::Deployed => "deployed",
            Phase::MountVerified => "mount_verified",
            Phase::ConformancePassed => "conformance_passed",
            Phase::CleanedUp => "cleaned_up",
        };
        f.write_str(s)
    }
}
