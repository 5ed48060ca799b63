//! Dependency graph construction over a corpus of package definitions.
//!
//! Nodes are package-and-artifact identities (`package:artifact`), so
//! distinct sub-artifacts of the same package are distinguishable. Edges
//! encode "this node requires that node be built/present first", derived
//! from declared build-time and runtime dependencies and from
//! package-to-subpackage provenance. The graph is rebuilt fresh on every
//! invocation; acyclicity is NOT enforced here -- cycle detection is a
//! caller concern.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;

use thiserror::Error;

use crate::corpus::Corpus;
use crate::identity::IdentityError;
use crate::settings::BuildSettings;

/// Errors that can occur while building or transforming a graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The corpus directory held zero package definitions.
    #[error("no package definitions found in {dir}", dir = .dir.display())]
    EmptyCorpus {
        /// The directory that was scanned.
        dir: PathBuf,
    },

    /// A definition file could not be read or parsed; the underlying
    /// loader error is propagated verbatim.
    #[error("loading {path}", path = .path.display())]
    Load {
        /// The definition file that failed to load.
        path: PathBuf,
        /// The loader's error.
        #[source]
        source: apkforge_schema::ConfigError,
    },

    /// The corpus directory could not be traversed.
    #[error("walking corpus {dir}", dir = .dir.display())]
    Walk {
        /// The directory being traversed.
        dir: PathBuf,
        /// The traversal failure.
        #[source]
        source: walkdir::Error,
    },

    /// Two definition files declare the same package name.
    #[error("duplicate definition for package {package}: {first} and {second}", first = .first.display(), second = .second.display())]
    DuplicatePackage {
        /// The duplicated package name.
        package: String,
        /// The definition seen first.
        first: PathBuf,
        /// The conflicting definition.
        second: PathBuf,
    },

    /// The graph could not be constructed from the corpus.
    #[error("graph construction failed: {reason}")]
    Construction {
        /// What went wrong.
        reason: String,
    },

    /// A filter produced an edge whose endpoint is not in the graph.
    /// This is an internal invariant violation -- a defect, never an
    /// expected runtime condition.
    #[error("filter invariant violated: dangling edge {from} -> {to}")]
    DanglingEdge {
        /// Source endpoint of the dangling edge.
        from: NodeId,
        /// The missing target endpoint.
        to: NodeId,
    },

    /// The adjacency projection could not be hashed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Graph node identity: owning package name plus emitted artifact name.
///
/// The main package of a definition is the node whose artifact equals its
/// package name; every other node of that package is a sub-artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    package: String,
    artifact: String,
}

impl NodeId {
    /// Node for a package's primary artifact.
    pub fn main(package: &str) -> Self {
        Self {
            package: package.to_string(),
            artifact: package.to_string(),
        }
    }

    /// Node for an emitted artifact of `package`.
    pub fn artifact_of(package: &str, artifact: &str) -> Self {
        Self {
            package: package.to_string(),
            artifact: artifact.to_string(),
        }
    }

    /// The owning package name; also the node's short-name in adjacency
    /// projections.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The emitted artifact name.
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// True when this node is its package's primary artifact.
    pub fn is_main(&self) -> bool {
        self.package == self.artifact
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.package, self.artifact)
    }
}

/// Whether a node's defining package exists in the local corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Defined by a definition in the corpus.
    Local,
    /// Resolved from configured repositories; recorded as a leaf node and
    /// never expanded further.
    External,
}

/// A directed "needs" graph over package artifacts.
///
/// Deterministic by construction: nodes and edges live in ordered
/// collections, so iteration, projection, and hashing are stable across
/// runs regardless of corpus file enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub(crate) nodes: BTreeMap<NodeId, Origin>,
    pub(crate) edges: BTreeSet<(NodeId, NodeId)>,
}

impl DependencyGraph {
    /// Build the graph for every definition in `corpus`.
    ///
    /// Per definition: one Local node for the main package and one per
    /// subpackage, a provenance edge from each subpackage to its main
    /// package, and a dependency edge from the main package to the
    /// provider of each declared build-time and runtime dependency.
    /// Dependencies not provided locally become External leaf nodes;
    /// `settings` names the extra repositories and keyring such externals
    /// would resolve from.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DanglingEdge`] if construction produces an
    /// inconsistent edge set (a defect, not an expected condition).
    pub fn build(corpus: &Corpus, settings: &BuildSettings) -> Result<Self, GraphError> {
        let mut graph = Self::default();

        for (name, config) in corpus.configs() {
            let main = NodeId::main(name);
            graph.nodes.insert(main.clone(), Origin::Local);

            for sub in &config.subpackages {
                let sub_node = NodeId::artifact_of(name, &sub.name);
                graph.nodes.insert(sub_node.clone(), Origin::Local);
                graph.edges.insert((sub_node, main.clone()));
            }

            let deps = config
                .environment
                .contents
                .packages
                .iter()
                .chain(config.package.dependencies.runtime.iter());
            for dep in deps {
                let target = match corpus.provider_of(dep) {
                    Some(owner) => NodeId::artifact_of(owner, dep),
                    None => NodeId::main(dep),
                };
                if target == main {
                    continue;
                }
                let origin = if corpus.provider_of(dep).is_some() {
                    Origin::Local
                } else {
                    Origin::External
                };
                graph.nodes.entry(target.clone()).or_insert(origin);
                graph.edges.insert((main.clone(), target));
            }
        }

        tracing::debug!(
            dir = %corpus.dir().display(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            repositories = settings.repositories.len(),
            keyring = settings.keyring.len(),
            "built dependency graph"
        );
        graph.validated()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True when `node` is in the graph.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// The origin of `node`, when present.
    pub fn origin(&self, node: &NodeId) -> Option<Origin> {
        self.nodes.get(node).copied()
    }

    /// Iterate over nodes in order, with their origins.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, Origin)> {
        self.nodes.iter().map(|(n, o)| (n, *o))
    }

    /// Direct dependencies of every node, keyed in node order. Every node
    /// appears, including those with no outgoing edges.
    pub fn adjacency(&self) -> BTreeMap<&NodeId, BTreeSet<&NodeId>> {
        let mut out: BTreeMap<&NodeId, BTreeSet<&NodeId>> = BTreeMap::new();
        for node in self.nodes.keys() {
            out.insert(node, BTreeSet::new());
        }
        for (from, to) in &self.edges {
            if let Some(targets) = out.get_mut(from) {
                targets.insert(to);
            }
        }
        out
    }

    /// Every node that transitively requires `node` (reverse
    /// reachability). Does not include `node` itself.
    pub fn ancestors(&self, node: &NodeId) -> BTreeSet<NodeId> {
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut queue: VecDeque<&NodeId> = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            for (from, to) in &self.edges {
                if to == current && !seen.contains(from) && from != node {
                    seen.insert(from.clone());
                    queue.push_back(from);
                }
            }
        }
        seen
    }

    /// Check the no-dangling-edges invariant and return the graph.
    pub(crate) fn validated(self) -> Result<Self, GraphError> {
        for (from, to) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::DanglingEdge {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            if !self.nodes.contains_key(to) {
                return Err(GraphError::DanglingEdge {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
        Ok(self)
    }
}
