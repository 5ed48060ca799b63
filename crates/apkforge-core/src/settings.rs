//! Engine-level defaults shared by the planner and the graph builder.

use std::path::PathBuf;

use apkforge_schema::Arch;

/// Provider-level defaults merged into every plan and graph build.
///
/// Passed explicitly by reference into the planner and graph builder;
/// there is no ambient global state. A definition may extend these
/// defaults (extra repositories, its own arch list) but never replaces
/// them wholesale.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Base directory containing definitions and per-package source dirs.
    pub dir: PathBuf,
    /// Directory receiving built artifacts, scoped per arch beneath it.
    pub out_dir: PathBuf,
    /// Shared build cache directory.
    pub cache_dir: PathBuf,
    /// Directory of pipeline definitions consumed by the build engine.
    pub pipeline_dir: PathBuf,
    /// Default target architectures, used when a definition declares none.
    pub archs: Vec<Arch>,
    /// Extra repositories to search for build-time packages.
    pub repositories: Vec<String>,
    /// Extra keys trusted for package verification.
    pub keyring: Vec<String>,
    /// Path to the private key used to sign packages. Only passed to the
    /// build engine when the file actually exists.
    pub signing_key: PathBuf,
    /// Runner the build engine executes pipelines with.
    pub runner: String,
    /// Namespace for built packages; empty means none.
    pub namespace: String,
    /// Rebuild even when the target artifact already exists.
    pub force_rebuild: bool,
    /// Ask the build engine to (re)generate the package index after a build.
    pub generate_index: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self::for_dir(PathBuf::from("."))
    }
}

impl BuildSettings {
    /// Settings rooted at `dir`, with the conventional subdirectory layout
    /// and default signing key / runner.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            out_dir: dir.join("packages"),
            cache_dir: dir.join("cache"),
            pipeline_dir: dir.join("pipelines"),
            archs: Vec::new(),
            repositories: Vec::new(),
            keyring: Vec::new(),
            signing_key: dir.join("local-melange.rsa"),
            runner: "docker".to_string(),
            namespace: String::new(),
            force_rebuild: false,
            generate_index: true,
            dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_rooted_at_dir() {
        let s = BuildSettings::for_dir("/work");
        assert_eq!(s.out_dir, PathBuf::from("/work/packages"));
        assert_eq!(s.cache_dir, PathBuf::from("/work/cache"));
        assert_eq!(s.pipeline_dir, PathBuf::from("/work/pipelines"));
        assert_eq!(s.signing_key, PathBuf::from("/work/local-melange.rsa"));
        assert_eq!(s.runner, "docker");
        assert!(!s.force_rebuild);
    }
}
