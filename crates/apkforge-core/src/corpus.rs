//! Corpus loading: the universe of package definitions under a directory.
//!
//! A corpus is rebuilt from disk on every graph query; nothing is cached
//! across invocations. Pipeline definitions live under `pipelines/` and
//! are the build engine's concern, so that subtree is not scanned for
//! package definitions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use apkforge_schema::PackageConfig;
use walkdir::WalkDir;

use crate::graph::GraphError;

/// Every package definition found under a corpus directory.
#[derive(Debug)]
pub struct Corpus {
    dir: PathBuf,
    configs: BTreeMap<String, PackageConfig>,
    /// Artifact name -> owning package name, covering main packages and
    /// every emitted sub-artifact.
    providers: BTreeMap<String, String>,
}

impl Corpus {
    /// Load every `*.yaml` definition under `dir`, skipping `pipelines/`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EmptyCorpus`] when no definitions are found,
    /// [`GraphError::Load`] propagating a parse or read failure verbatim,
    /// [`GraphError::Walk`] if the directory cannot be traversed, and
    /// [`GraphError::DuplicatePackage`] / [`GraphError::Construction`]
    /// when two definitions claim the same package or artifact name.
    pub fn load(dir: &Path) -> Result<Self, GraphError> {
        let mut configs: BTreeMap<String, PackageConfig> = BTreeMap::new();
        let mut sources: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut providers: BTreeMap<String, String> = BTreeMap::new();

        let walk = WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == "pipelines"));

        for entry in walk {
            let entry = entry.map_err(|source| GraphError::Walk {
                dir: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !is_definition(entry.path()) {
                continue;
            }

            let path = entry.path();
            let config = PackageConfig::from_file(path).map_err(|source| GraphError::Load {
                path: path.to_path_buf(),
                source,
            })?;
            let name = config.package.name.clone();

            if let Some(first) = sources.get(&name) {
                return Err(GraphError::DuplicatePackage {
                    package: name,
                    first: first.clone(),
                    second: path.to_path_buf(),
                });
            }

            for artifact in config.artifact_names() {
                if let Some(prev) = providers.insert(artifact.to_string(), name.clone()) {
                    return Err(GraphError::Construction {
                        reason: format!(
                            "artifact {artifact} is emitted by both {prev} and {name}"
                        ),
                    });
                }
            }

            sources.insert(name.clone(), path.to_path_buf());
            configs.insert(name, config);
        }

        if configs.is_empty() {
            return Err(GraphError::EmptyCorpus {
                dir: dir.to_path_buf(),
            });
        }

        tracing::debug!(dir = %dir.display(), packages = configs.len(), "loaded corpus");
        Ok(Self {
            dir: dir.to_path_buf(),
            configs,
            providers,
        })
    }

    /// The directory this corpus was loaded from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of package definitions in the corpus.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// True when the corpus holds no definitions. Unreachable after a
    /// successful [`Corpus::load`], which rejects empty corpora.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Iterate over definitions in package-name order.
    pub fn configs(&self) -> impl Iterator<Item = (&str, &PackageConfig)> {
        self.configs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a definition by package name.
    pub fn get(&self, package: &str) -> Option<&PackageConfig> {
        self.configs.get(package)
    }

    /// True when `package` is defined within this corpus.
    pub fn contains_package(&self, package: &str) -> bool {
        self.configs.contains_key(package)
    }

    /// The package that emits `artifact`, when locally defined.
    pub fn provider_of(&self, artifact: &str) -> Option<&str> {
        self.providers.get(artifact).map(String::as_str)
    }
}

fn is_definition(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}
