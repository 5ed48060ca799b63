//! Concurrent build dispatch.
//!
//! Runs every `build`-marked plan as its own task, one per architecture.
//! Architectures are mutually independent (each writes to its own
//! arch-scoped output subdirectory), so no ordering is imposed and no
//! in-process locks are needed. A failing architecture never cancels its
//! siblings; all failures are aggregated so the caller sees the full set.

use std::sync::Arc;

use apkforge_schema::Arch;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::engine::BuildEngine;
use crate::planner::{BuildPlan, PlanAction};

/// One architecture's build failure, with its underlying cause.
#[derive(Debug)]
pub struct BuildFailure {
    /// The architecture whose build failed.
    pub arch: Arch,
    /// The build-specific error reported by the engine, or the
    /// cancellation that interrupted it.
    pub cause: anyhow::Error,
}

/// Errors that can occur while dispatching builds.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// One or more architecture builds failed. Architectures that
    /// succeeded before the failure keep their artifacts in place; there
    /// is no rollback and no internal retry.
    #[error("building {package}: failed for [{archs}]", archs = failed_archs(.failures))]
    BuildFailed {
        /// The package being reconciled.
        package: String,
        /// Every failing architecture with its cause.
        failures: Vec<BuildFailure>,
        /// Architectures whose builds completed despite the failures.
        succeeded: Vec<Arch>,
    },
}

fn failed_archs(failures: &[BuildFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.arch, f.cause))
        .collect::<Vec<_>>()
        .join(", ")
}

/// What a dispatch actually did.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Architectures built by this dispatch, in plan order.
    pub built: Vec<Arch>,
    /// Architectures skipped because their artifact already existed.
    pub skipped: Vec<Arch>,
}

/// Run every build plan concurrently and wait for all of them.
///
/// Cancellation is cooperative: when `cancel` fires, in-flight builds are
/// asked to stop and report as failures; partial artifacts are not
/// cleaned up, so a cancelled run needs a fresh rebuild check.
///
/// # Errors
///
/// Returns [`DispatchError::BuildFailed`] aggregating every per-arch
/// failure; successfully built architectures are listed alongside so
/// partial success is never silently swallowed.
pub async fn dispatch(
    package: &str,
    plans: Vec<BuildPlan>,
    engine: Arc<dyn BuildEngine>,
    cancel: CancellationToken,
) -> Result<DispatchOutcome, DispatchError> {
    let mut outcome = DispatchOutcome::default();
    let mut handles = Vec::new();

    for plan in plans {
        match plan.action {
            PlanAction::Skip { .. } => outcome.skipped.push(plan.arch),
            PlanAction::Build(opts) => {
                let engine = Arc::clone(&engine);
                let cancel = cancel.clone();
                let arch = plan.arch;
                tracing::debug!(package, %arch, "dispatching build");
                handles.push((
                    arch,
                    tokio::spawn(async move {
                        tokio::select! {
                            () = cancel.cancelled() => {
                                Err(anyhow::anyhow!("build cancelled before completion"))
                            }
                            result = engine.build(&opts) => result,
                        }
                    }),
                ));
            }
        }
    }

    let mut failures = Vec::new();
    for (arch, handle) in handles {
        match handle.await {
            Ok(Ok(())) => {
                tracing::debug!(package, %arch, "build complete");
                outcome.built.push(arch);
            }
            Ok(Err(cause)) => {
                tracing::warn!(package, %arch, %cause, "build failed");
                failures.push(BuildFailure { arch, cause });
            }
            Err(join) => {
                tracing::warn!(package, %arch, "build task aborted");
                failures.push(BuildFailure {
                    arch,
                    cause: anyhow::anyhow!("build task aborted: {join}"),
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(outcome)
    } else {
        Err(DispatchError::BuildFailed {
            package: package.to_string(),
            failures,
            succeeded: outcome.built,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BuildOptions;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Engine double that records invocations and fails on demand.
    struct RecordingEngine {
        calls: Mutex<Vec<Arch>>,
        fail: BTreeSet<Arch>,
        block: bool,
    }

    impl RecordingEngine {
        fn new(fail: impl IntoIterator<Item = Arch>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: fail.into_iter().collect(),
                block: false,
            }
        }
    }

    #[async_trait]
    impl BuildEngine for RecordingEngine {
        async fn build(&self, opts: &BuildOptions) -> anyhow::Result<()> {
            if self.block {
                futures::future::pending::<()>().await;
            }
            self.calls.lock().unwrap().push(opts.arch);
            if self.fail.contains(&opts.arch) {
                anyhow::bail!("simulated failure for {}", opts.arch)
            }
            Ok(())
        }
    }

    fn build_plan(arch: Arch) -> BuildPlan {
        BuildPlan {
            arch,
            action: PlanAction::Build(Box::new(BuildOptions {
                package: "minimal".into(),
                arch,
                config_file: PathBuf::from("minimal.yaml"),
                pipeline_dir: PathBuf::from("pipelines"),
                out_dir: PathBuf::from("packages"),
                cache_dir: PathBuf::from("cache"),
                source_dir: None,
                signing_key: None,
                env_file: None,
                namespace: None,
                repositories: Vec::new(),
                keyring: Vec::new(),
                runner: "docker".into(),
                generate_index: true,
                log_file: PathBuf::from("logs/build.log"),
            })),
        }
    }

    fn skip_plan(arch: Arch) -> BuildPlan {
        BuildPlan {
            arch,
            action: PlanAction::Skip {
                artifact: PathBuf::from("packages/x/y.apk"),
            },
        }
    }

    #[tokio::test]
    async fn test_all_architectures_build() {
        let engine = Arc::new(RecordingEngine::new([]));
        let plans = vec![build_plan(Arch::X86_64), build_plan(Arch::Aarch64)];

        let outcome = dispatch("minimal", plans, engine.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.built, vec![Arch::X86_64, Arch::Aarch64]);
        assert!(outcome.skipped.is_empty());
        assert_eq!(engine.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_prevent_sibling() {
        let engine = Arc::new(RecordingEngine::new([Arch::X86_64]));
        let plans = vec![build_plan(Arch::X86_64), build_plan(Arch::Aarch64)];

        let err = dispatch("minimal", plans, engine.clone(), CancellationToken::new())
            .await
            .unwrap_err();

        let DispatchError::BuildFailed {
            package,
            failures,
            succeeded,
        } = err;
        assert_eq!(package, "minimal");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].arch, Arch::X86_64);
        assert_eq!(succeeded, vec![Arch::Aarch64]);
        // Both architectures were attempted despite the failure.
        assert_eq!(engine.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_error_message_names_package_and_archs() {
        let engine = Arc::new(RecordingEngine::new([Arch::X86_64, Arch::S390x]));
        let plans = vec![build_plan(Arch::X86_64), build_plan(Arch::S390x)];

        let err = dispatch("minimal", plans, engine, CancellationToken::new())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("minimal"));
        assert!(msg.contains("x86_64"));
        assert!(msg.contains("s390x"));
    }

    #[tokio::test]
    async fn test_skip_plans_invoke_nothing() {
        let engine = Arc::new(RecordingEngine::new([]));
        let plans = vec![skip_plan(Arch::X86_64)];

        let outcome = dispatch("minimal", plans, engine.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.built.is_empty());
        assert_eq!(outcome.skipped, vec![Arch::X86_64]);
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_in_flight_builds() {
        let engine = Arc::new(RecordingEngine {
            calls: Mutex::new(Vec::new()),
            fail: BTreeSet::new(),
            block: true,
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = dispatch(
            "minimal",
            vec![build_plan(Arch::X86_64)],
            engine.clone(),
            cancel,
        )
        .await
        .unwrap_err();

        let DispatchError::BuildFailed { failures, .. } = err;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].cause.to_string().contains("cancelled"));
        assert!(engine.calls.lock().unwrap().is_empty());
    }
}
