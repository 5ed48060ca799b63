//! YAML package definition parsing.
//!
//! A definition declares a package (name, version, epoch), the build
//! environment it needs, and any additional sub-artifacts it emits. The
//! structured form is what the engines consume; raw text never crosses
//! the engine boundary except when the planner persists a definition to a
//! location the build engine can read.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arch::Arch;

/// Errors that can occur when loading or parsing a package definition.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading a definition file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML content could not be deserialized into a valid definition.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Identity of a package: name, version, and rebuild epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Unique name of the package within a corpus.
    pub name: String,
    /// Upstream version string.
    pub version: String,
    /// Monotonically increasing integer disambiguating rebuilds of the
    /// same name+version.
    #[serde(default)]
    pub epoch: u64,
    /// Runtime dependency declarations.
    #[serde(default)]
    pub dependencies: Dependencies,
}

/// Dependency lists grouped by when they are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Packages required at runtime by the built artifact.
    #[serde(default)]
    pub runtime: Vec<String>,
}

/// The packages, repositories, and keys available inside the build
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contents {
    /// Repositories to search for build-time packages.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Keys trusted for package verification.
    #[serde(default)]
    pub keyring: Vec<String>,
    /// Packages required at build time.
    #[serde(default)]
    pub packages: Vec<String>,
}

impl Contents {
    /// The union of the declared repositories and provider-level extras,
    /// sorted and deduplicated.
    pub fn merged_repositories(&self, extra: &[String]) -> Vec<String> {
        merge_unique(&self.repositories, extra)
    }

    /// The union of the declared keyring and provider-level extras,
    /// sorted and deduplicated.
    pub fn merged_keyring(&self, extra: &[String]) -> Vec<String> {
        merge_unique(&self.keyring, extra)
    }
}

fn merge_unique(a: &[String], b: &[String]) -> Vec<String> {
    let mut out: Vec<String> = a.iter().chain(b.iter()).cloned().collect();
    out.sort();
    out.dedup();
    out
}

/// Specification of the environment a package is built in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Build-environment contents (repositories, keyring, packages).
    #[serde(default)]
    pub contents: Contents,
    /// Target architectures declared by the definition. When empty, the
    /// planner falls back to the engine-level default list.
    #[serde(default)]
    pub archs: Vec<Arch>,
}

/// An additional artifact emitted by a package build, distinct from the
/// main package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subpackage {
    /// Name of the emitted sub-artifact.
    pub name: String,
}

/// A complete parsed package definition.
///
/// Immutable once read. Produced by the external config loader (the serde
/// seam below) and consumed by the planner and the graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Package identity and runtime dependencies.
    pub package: Package,
    /// Build environment specification.
    #[serde(default)]
    pub environment: Environment,
    /// Additional artifacts this definition emits.
    #[serde(default)]
    pub subpackages: Vec<Subpackage>,
}

impl PackageConfig {
    /// Parse a package definition from a YAML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if the YAML content is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a package definition from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the YAML content is invalid or
    /// does not match the expected schema.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Serialize this definition back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Canonical artifact filename: `<name>-<version>-r<epoch>.apk`.
    ///
    /// Bumping the epoch changes the filename, so a prior epoch's artifact
    /// never satisfies the new target path.
    pub fn artifact_file_name(&self) -> String {
        format!(
            "{}-{}-r{}.apk",
            self.package.name, self.package.version, self.package.epoch
        )
    }

    /// All artifact names this definition emits: the main package first,
    /// then each subpackage in declaration order.
    pub fn artifact_names(&self) -> Vec<&str> {
        std::iter::once(self.package.name.as_str())
            .chain(self.subpackages.iter().map(|s| s.name.as_str()))
            .collect()
    }
}

impl std::str::FromStr for PackageConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml(s)
    }
}
