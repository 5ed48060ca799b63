//! Architecture planning: decide per architecture whether a build is
//! needed and resolve the full build-engine option set when it is.
//!
//! The skip policy is deliberately singular: an architecture is skipped
//! exactly when its target artifact already exists and force-rebuild is
//! not set. This is the idempotency gate; reconciliation is a no-op when
//! nothing changed and the artifact is already present.

use std::fs;
use std::path::{Path, PathBuf};

use apkforge_schema::{Arch, PackageConfig};
use thiserror::Error;

use crate::engine::BuildOptions;
use crate::paths::{artifact_path, build_log_path, probe};
use crate::settings::BuildSettings;

/// Errors that can occur while planning builds for a package.
#[derive(Error, Debug)]
pub enum PlanError {
    /// The definition is malformed, or a required directory or file could
    /// not be materialized.
    #[error("invalid configuration for {package}: {reason}")]
    ConfigInvalid {
        /// Package the plan was computed for.
        package: String,
        /// What was malformed or could not be created.
        reason: String,
        /// Underlying I/O failure, when there was one.
        #[source]
        source: Option<std::io::Error>,
    },

    /// Option resolution failed for one architecture.
    #[error("planning {package}/{arch}: {reason}")]
    Planning {
        /// Package the plan was computed for.
        package: String,
        /// Architecture whose options were being resolved.
        arch: Arch,
        /// The probe or path computation that failed.
        reason: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// The per-architecture decision: skip, or build with resolved options.
#[derive(Debug)]
pub enum PlanAction {
    /// The target artifact already exists; nothing to do.
    Skip {
        /// The existing artifact that satisfied the target path.
        artifact: PathBuf,
    },
    /// A build is required, with the fully resolved engine options.
    Build(Box<BuildOptions>),
}

/// One architecture's slice of a reconciliation.
///
/// Plans are computed independently per architecture; they share no
/// mutable state.
#[derive(Debug)]
pub struct BuildPlan {
    /// The architecture this plan covers.
    pub arch: Arch,
    /// Skip or build.
    pub action: PlanAction,
}

impl BuildPlan {
    /// True when this plan requires a build.
    pub fn is_build(&self) -> bool {
        matches!(self.action, PlanAction::Build(_))
    }

    /// The resolved build options, when this plan is a build.
    pub fn options(&self) -> Option<&BuildOptions> {
        match &self.action {
            PlanAction::Build(opts) => Some(opts),
            PlanAction::Skip { .. } => None,
        }
    }
}

/// Compute build plans for every target architecture of `config`.
///
/// The definition's arch list is used when non-empty; otherwise the
/// engine-level default list applies. An empty resulting list yields an
/// empty plan vector, which is not an error: it signals nothing to build.
///
/// Shared inputs are materialized before any per-arch work: the output
/// and cache directories are created, and the definition is persisted to
/// `<dir>/<name>.yaml` whenever the file is absent or no longer matches
/// the definition being planned, so the build engine always reads the
/// current definition. This is the single permitted pass-through of
/// config text.
///
/// # Errors
///
/// Returns [`PlanError::ConfigInvalid`] if the definition is missing its
/// name or version or a required directory cannot be created, and
/// [`PlanError::Planning`] if per-arch option resolution fails.
pub fn plan(config: &PackageConfig, settings: &BuildSettings) -> Result<Vec<BuildPlan>, PlanError> {
    let package = config.package.name.clone();
    if package.is_empty() {
        return Err(invalid(&package, "package name is empty", None));
    }
    if config.package.version.is_empty() {
        return Err(invalid(&package, "package version is empty", None));
    }

    let archs = if config.environment.archs.is_empty() {
        settings.archs.clone()
    } else {
        config.environment.archs.clone()
    };
    if archs.is_empty() {
        tracing::debug!(package, "no target architectures, nothing to plan");
        return Ok(Vec::new());
    }

    for dir in [&settings.dir, &settings.out_dir, &settings.cache_dir] {
        fs::create_dir_all(dir).map_err(|e| {
            invalid(&package, &format!("creating {}", dir.display()), Some(e))
        })?;
    }

    let config_file = persist_definition(config, settings, &package)?;

    let repositories = config
        .environment
        .contents
        .merged_repositories(&settings.repositories);
    let keyring = config
        .environment
        .contents
        .merged_keyring(&settings.keyring);

    let artifact = config.artifact_file_name();
    let mut plans = Vec::with_capacity(archs.len());

    for arch in archs {
        let target = artifact_path(&settings.out_dir, arch, &artifact);
        let already_built = probe(&target)
            .map_err(|e| resolving(&package, arch, &target, e))?
            .is_present();

        if already_built && !settings.force_rebuild {
            tracing::debug!(package, %arch, artifact = %target.display(), "already built, skipping");
            plans.push(BuildPlan {
                arch,
                action: PlanAction::Skip { artifact: target },
            });
            continue;
        }

        let arch_out = settings.out_dir.join(arch.as_apk());
        fs::create_dir_all(&arch_out).map_err(|e| {
            invalid(&package, &format!("creating {}", arch_out.display()), Some(e))
        })?;

        // Optional inputs degrade silently to the engine default when
        // absent; only a real probe failure aborts planning.
        let source_dir = present_only(&package, arch, settings.dir.join(&package))?;
        let signing_key = present_only(&package, arch, settings.signing_key.clone())?;
        let env_file =
            present_only(&package, arch, settings.dir.join(format!("build-{arch}.env")))?;
        let namespace = (!settings.namespace.is_empty()).then(|| settings.namespace.clone());

        tracing::debug!(package, %arch, "will build");
        plans.push(BuildPlan {
            arch,
            action: PlanAction::Build(Box::new(BuildOptions {
                package: package.clone(),
                arch,
                config_file: config_file.clone(),
                pipeline_dir: settings.pipeline_dir.clone(),
                out_dir: settings.out_dir.clone(),
                cache_dir: settings.cache_dir.clone(),
                source_dir,
                signing_key,
                env_file,
                namespace,
                repositories: repositories.clone(),
                keyring: keyring.clone(),
                runner: settings.runner.clone(),
                generate_index: settings.generate_index,
                log_file: build_log_path(&settings.dir, &package, arch),
            })),
        });
    }

    Ok(plans)
}

/// Write the definition to `<dir>/<name>.yaml` unless the file already
/// holds a semantically equal definition. An out-of-date file (say, a
/// prior epoch left from an earlier reconciliation) is rewritten, since
/// the engine reads this file and must see the definition being planned;
/// a corpus-managed file that parses to the same definition keeps its
/// original bytes.
fn persist_definition(
    config: &PackageConfig,
    settings: &BuildSettings,
    package: &str,
) -> Result<PathBuf, PlanError> {
    let config_file = settings.dir.join(format!("{package}.yaml"));
    if definition_is_current(&config_file, config, package)? {
        return Ok(config_file);
    }
    let text = config
        .to_yaml()
        .map_err(|e| invalid(package, &format!("serializing definition: {e}"), None))?;
    fs::write(&config_file, text)
        .map_err(|e| invalid(package, &format!("writing {}", config_file.display()), Some(e)))?;
    Ok(config_file)
}

/// True when the file at `path` parses to a definition equal to `config`.
/// An unparseable file counts as stale and gets rewritten.
fn definition_is_current(
    path: &Path,
    config: &PackageConfig,
    package: &str,
) -> Result<bool, PlanError> {
    let presence = probe(path)
        .map_err(|e| invalid(package, &format!("probing {}", path.display()), Some(e)))?;
    if !presence.is_present() {
        return Ok(false);
    }
    let text = fs::read_to_string(path)
        .map_err(|e| invalid(package, &format!("reading {}", path.display()), Some(e)))?;
    Ok(PackageConfig::from_yaml(&text).is_ok_and(|existing| existing == *config))
}

fn present_only(
    package: &str,
    arch: Arch,
    path: PathBuf,
) -> Result<Option<PathBuf>, PlanError> {
    match probe(&path) {
        Ok(p) if p.is_present() => Ok(Some(path)),
        Ok(_) => Ok(None),
        Err(e) => Err(resolving(package, arch, &path, e)),
    }
}

fn invalid(package: &str, reason: &str, source: Option<std::io::Error>) -> PlanError {
    PlanError::ConfigInvalid {
        package: package.to_string(),
        reason: reason.to_string(),
        source,
    }
}

fn resolving(package: &str, arch: Arch, path: &Path, source: std::io::Error) -> PlanError {
    PlanError::Planning {
        package: package.to_string(),
        arch,
        reason: format!("probing {}", path.display()),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkforge_schema::Arch;

    fn minimal(epoch: u64) -> PackageConfig {
        PackageConfig::from_yaml(&format!(
            "package:\n  name: minimal\n  version: 0.0.1\n  epoch: {epoch}\nenvironment:\n  archs: [x86_64]\n"
        ))
        .unwrap()
    }

    fn settings(tmp: &tempfile::TempDir) -> BuildSettings {
        BuildSettings::for_dir(tmp.path())
    }

    #[test]
    fn test_fresh_package_plans_one_build() {
        let tmp = tempfile::tempdir().unwrap();
        let plans = plan(&minimal(3), &settings(&tmp)).unwrap();

        assert_eq!(plans.len(), 1);
        let opts = plans[0].options().expect("should be a build");
        assert_eq!(opts.arch, Arch::X86_64);
        assert_eq!(opts.config_file, tmp.path().join("minimal.yaml"));
        assert!(opts.config_file.exists(), "definition must be persisted");
        assert!(opts.source_dir.is_none());
        assert!(opts.signing_key.is_none());
        assert!(opts.env_file.is_none());
        assert!(opts.namespace.is_none());
    }

    #[test]
    fn test_existing_artifact_skips() {
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(&tmp);
        let arch_dir = s.out_dir.join("x86_64");
        fs::create_dir_all(&arch_dir).unwrap();
        fs::write(arch_dir.join("minimal-0.0.1-r3.apk"), b"apk").unwrap();

        let plans = plan(&minimal(3), &s).unwrap();
        assert_eq!(plans.len(), 1);
        assert!(!plans[0].is_build());
    }

    #[test]
    fn test_force_rebuild_overrides_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = settings(&tmp);
        let arch_dir = s.out_dir.join("x86_64");
        fs::create_dir_all(&arch_dir).unwrap();
        fs::write(arch_dir.join("minimal-0.0.1-r3.apk"), b"apk").unwrap();
        s.force_rebuild = true;

        let plans = plan(&minimal(3), &s).unwrap();
        assert!(plans[0].is_build());
    }

    #[test]
    fn test_epoch_bump_requires_new_build() {
        // The r3 artifact does not satisfy the r4 target path.
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(&tmp);
        let arch_dir = s.out_dir.join("x86_64");
        fs::create_dir_all(&arch_dir).unwrap();
        fs::write(arch_dir.join("minimal-0.0.1-r3.apk"), b"apk").unwrap();

        let plans = plan(&minimal(4), &s).unwrap();
        assert!(plans[0].is_build());
    }

    #[test]
    fn test_no_archs_yields_no_plans() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg =
            PackageConfig::from_yaml("package:\n  name: minimal\n  version: 0.0.1\n").unwrap();
        let plans = plan(&cfg, &settings(&tmp)).unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn test_default_archs_apply_when_config_declares_none() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg =
            PackageConfig::from_yaml("package:\n  name: minimal\n  version: 0.0.1\n").unwrap();
        let mut s = settings(&tmp);
        s.archs = vec![Arch::X86_64, Arch::Aarch64];

        let plans = plan(&cfg, &s).unwrap();
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(BuildPlan::is_build));
    }

    #[test]
    fn test_optional_inputs_included_only_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = settings(&tmp);
        s.namespace = "wolfi".to_string();
        fs::create_dir_all(tmp.path().join("minimal")).unwrap();
        fs::write(tmp.path().join("local-melange.rsa"), b"key").unwrap();
        fs::write(tmp.path().join("build-x86_64.env"), b"FOO=1").unwrap();

        let plans = plan(&minimal(3), &s).unwrap();
        let opts = plans[0].options().unwrap();
        assert_eq!(opts.source_dir.as_deref(), Some(tmp.path().join("minimal").as_path()));
        assert_eq!(
            opts.signing_key.as_deref(),
            Some(tmp.path().join("local-melange.rsa").as_path())
        );
        assert_eq!(
            opts.env_file.as_deref(),
            Some(tmp.path().join("build-x86_64.env").as_path())
        );
        assert_eq!(opts.namespace.as_deref(), Some("wolfi"));
    }

    #[test]
    fn test_equal_definition_is_not_clobbered() {
        // Formatted differently from to_yaml() output but parses to the
        // same definition, so the original bytes stay untouched.
        let tmp = tempfile::tempdir().unwrap();
        let hand_written = "package: {name: minimal, version: 0.0.1, epoch: 3}\nenvironment: {archs: [x86_64]}\n";
        fs::write(tmp.path().join("minimal.yaml"), hand_written).unwrap();

        plan(&minimal(3), &settings(&tmp)).unwrap();
        let on_disk = fs::read_to_string(tmp.path().join("minimal.yaml")).unwrap();
        assert_eq!(on_disk, hand_written);
    }

    #[test]
    fn test_stale_definition_is_rewritten() {
        // An epoch bump must reach the engine: the persisted file from the
        // previous reconciliation is replaced, and the build plan's config
        // file parses back to the epoch being planned.
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(&tmp);
        plan(&minimal(3), &s).unwrap();

        let plans = plan(&minimal(4), &s).unwrap();
        let opts = plans[0].options().expect("epoch bump plans a build");
        let persisted = PackageConfig::from_file(&opts.config_file).unwrap();
        assert_eq!(persisted.package.epoch, 4);
        assert_eq!(persisted, minimal(4));
    }

    #[test]
    fn test_unparseable_definition_is_rewritten() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("minimal.yaml"), "package: [garbage").unwrap();

        plan(&minimal(3), &settings(&tmp)).unwrap();
        let persisted =
            PackageConfig::from_file(&tmp.path().join("minimal.yaml")).unwrap();
        assert_eq!(persisted, minimal(3));
    }

    #[test]
    fn test_empty_name_is_config_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = PackageConfig::from_yaml("package:\n  name: ''\n  version: 0.0.1\n").unwrap();
        let err = plan(&cfg, &settings(&tmp)).unwrap_err();
        assert!(matches!(err, PlanError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_repositories_merge_settings_extras() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = settings(&tmp);
        s.repositories = vec!["https://extra.example.org/os".into()];
        let cfg = PackageConfig::from_yaml(
            "package:\n  name: minimal\n  version: 0.0.1\nenvironment:\n  archs: [x86_64]\n  contents:\n    repositories: [https://base.example.org/os]\n",
        )
        .unwrap();

        let plans = plan(&cfg, &s).unwrap();
        let opts = plans[0].options().unwrap();
        assert_eq!(
            opts.repositories,
            vec![
                "https://base.example.org/os".to_string(),
                "https://extra.example.org/os".to_string()
            ]
        );
    }
}
