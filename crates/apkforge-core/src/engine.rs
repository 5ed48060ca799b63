//! The external build engine seam.
//!
//! The engine is an opaque executor: it receives a fully resolved
//! [`BuildOptions`] and either produces the artifact under the
//! arch-scoped output directory or fails. It is invoked at most once per
//! architecture per reconciliation and never retried internally; retry
//! policy belongs to the orchestrating caller.

use std::path::PathBuf;

use apkforge_schema::Arch;
use async_trait::async_trait;

/// The resolved option set for a single architecture build.
///
/// Optional fields are `None` when the corresponding input was absent on
/// disk (or, for `namespace`, empty); the engine falls back to its own
/// defaults in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Name of the package being built, for diagnostics.
    pub package: String,
    /// Target architecture.
    pub arch: Arch,
    /// Location of the persisted package definition.
    pub config_file: PathBuf,
    /// Directory of pipeline definitions.
    pub pipeline_dir: PathBuf,
    /// Output directory; the engine writes under `<out_dir>/<arch>/`.
    pub out_dir: PathBuf,
    /// Shared build cache directory.
    pub cache_dir: PathBuf,
    /// Extra source directory, when one exists for this package.
    pub source_dir: Option<PathBuf>,
    /// Signing key, when the configured key file exists.
    pub signing_key: Option<PathBuf>,
    /// Per-architecture environment override file, when present.
    pub env_file: Option<PathBuf>,
    /// Namespace for the built package, when configured.
    pub namespace: Option<String>,
    /// Repositories to search for build-time packages (definition plus
    /// engine defaults, deduplicated).
    pub repositories: Vec<String>,
    /// Keys trusted for package verification (definition plus engine
    /// defaults, deduplicated).
    pub keyring: Vec<String>,
    /// Runner executing the pipeline.
    pub runner: String,
    /// Whether to (re)generate the package index after the build.
    pub generate_index: bool,
    /// Destination for build logs.
    pub log_file: PathBuf,
}

/// An external executor that performs one architecture build.
///
/// Implementations must be safe to invoke concurrently: the dispatcher
/// runs one build per architecture in parallel, each writing to its own
/// arch-scoped output subdirectory.
#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// Run the build described by `opts` to completion.
    ///
    /// # Errors
    ///
    /// Returns a build-specific error; the dispatcher aggregates these
    /// per architecture without retrying.
    async fn build(&self, opts: &BuildOptions) -> anyhow::Result<()>;
}
