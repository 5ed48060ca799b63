//! Path conventions and filesystem presence probes.
//!
//! Directory layout under the base dir mirrors the build engine's
//! expectations: definitions and per-package source dirs at the root,
//! `pipelines/` for pipeline definitions, `packages/<arch>/` for output
//! artifacts, and `cache/` for the shared build cache. Architecture
//! subdirectories never collide because every arch maps to a distinct
//! canonical name ([`Arch::as_apk`]).

use std::io;
use std::path::{Path, PathBuf};

use apkforge_schema::Arch;

/// Result of a filesystem presence probe.
///
/// Absence is ordinary control flow for the planner (a missing optional
/// input degrades to "use engine default"), so it is distinguished from
/// a real I/O failure rather than conflated with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The path exists.
    Present,
    /// The path does not exist.
    Absent,
}

impl Presence {
    /// True when the path exists.
    pub fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Probe whether a path exists, keeping "absent" separate from "error".
///
/// # Errors
///
/// Returns the underlying I/O error for any failure other than
/// `NotFound` (e.g. a permission error on a parent directory).
pub fn probe(path: &Path) -> io::Result<Presence> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(Presence::Present),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Presence::Absent),
        Err(e) => Err(e),
    }
}

/// Expected artifact path: `<out_dir>/<arch>/<file>`.
pub fn artifact_path(out_dir: &Path, arch: Arch, file: &str) -> PathBuf {
    out_dir.join(arch.as_apk()).join(file)
}

/// Per-build log path: `<dir>/logs/build-<package>-<arch>.log`.
pub fn build_log_path(dir: &Path, package: &str, arch: Arch) -> PathBuf {
    dir.join("logs").join(format!("build-{package}-{arch}.log"))
}
