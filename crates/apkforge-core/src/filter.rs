//! Composable graph filters and the adjacency projection.
//!
//! Every filter is a pure function from graph to graph: inputs are never
//! mutated, so filters chain safely and test independently. Filters are
//! order-sensitive -- filtering to main packages before filtering to
//! local nodes can surface different edges than the reverse -- so the
//! composition order must be stated wherever filters are chained (the
//! conventional pipeline is local first, then mains-only, as in
//! [`GraphSummary::query`]).

use std::collections::{BTreeMap, BTreeSet};

use crate::corpus::Corpus;
use crate::graph::{DependencyGraph, GraphError, NodeId, Origin};
use crate::identity::{self, Identity};
use crate::settings::BuildSettings;

impl DependencyGraph {
    /// Keep only nodes satisfying `keep`; edges survive only when both
    /// endpoints do, so the result never contains a dangling edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DanglingEdge`] if the invariant check fails
    /// (a defect in this module, not a caller-visible condition).
    pub fn filter<F>(&self, keep: F) -> Result<Self, GraphError>
    where
        F: Fn(&NodeId, Origin) -> bool,
    {
        let nodes: BTreeMap<NodeId, Origin> = self
            .nodes
            .iter()
            .filter(|&(n, o)| keep(n, *o))
            .map(|(n, o)| (n.clone(), *o))
            .collect();
        let edges: BTreeSet<(NodeId, NodeId)> = self
            .edges
            .iter()
            .filter(|(from, to)| nodes.contains_key(from) && nodes.contains_key(to))
            .cloned()
            .collect();

        Self { nodes, edges }.validated()
    }

    /// Keep only nodes whose defining package exists in the local corpus,
    /// dropping externally-resolved dependency nodes. Idempotent.
    ///
    /// # Errors
    ///
    /// See [`DependencyGraph::filter`].
    pub fn filter_local(&self) -> Result<Self, GraphError> {
        self.filter(|_, origin| origin == Origin::Local)
    }

    /// Keep only nodes that are a package's primary artifact, rewriting
    /// edges that touched a sub-artifact to point at the owning main
    /// package instead. Self-edges produced by rewriting are dropped, as
    /// is any edge whose rewritten endpoint has no surviving owner.
    ///
    /// # Errors
    ///
    /// See [`DependencyGraph::filter`].
    pub fn filter_main_packages(&self, corpus: &Corpus) -> Result<Self, GraphError> {
        let nodes: BTreeMap<NodeId, Origin> = self
            .nodes
            .iter()
            .filter(|(n, _)| n.is_main())
            .map(|(n, o)| (n.clone(), *o))
            .collect();

        let rewrite = |node: &NodeId| -> Option<NodeId> {
            if node.is_main() {
                return nodes.contains_key(node).then(|| node.clone());
            }
            // A sub-artifact folds into its owning main package, which
            // only survives when the corpus actually defines it.
            let owner = NodeId::main(node.package());
            (corpus.contains_package(node.package()) && nodes.contains_key(&owner))
                .then_some(owner)
        };

        let mut edges: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
        for (from, to) in &self.edges {
            let Some(from) = rewrite(from) else { continue };
            let Some(to) = rewrite(to) else { continue };
            if from != to {
                edges.insert((from, to));
            }
        }

        Self { nodes, edges }.validated()
    }
}

/// The caller-facing projection of a filtered graph: adjacency by
/// short-name plus a digest identity for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSummary {
    /// Node short-name to sorted, distinct direct-dependency short-names.
    /// Every node is keyed, including those with no dependencies.
    pub deps: BTreeMap<String, Vec<String>>,
    /// Digest of `deps`; changes whenever any definition changes the
    /// graph shape.
    pub id: Identity,
}

impl GraphSummary {
    /// Project a graph to its short-name adjacency map and identity.
    ///
    /// Short-names strip the `:artifact` suffix; short-name
    /// self-references arising from the projection are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Identity`] if the adjacency map cannot be
    /// hashed.
    pub fn project(graph: &DependencyGraph) -> Result<Self, GraphError> {
        let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (node, targets) in graph.adjacency() {
            let entry = deps.entry(node.package().to_string()).or_default();
            for target in targets {
                if target.package() != node.package() {
                    entry.push(target.package().to_string());
                }
            }
        }
        for targets in deps.values_mut() {
            targets.sort();
            targets.dedup();
        }

        let id = identity::digest(&deps)?;
        Ok(Self { deps, id })
    }

    /// The standard graph query: build the graph for `corpus`, then
    /// filter -- local first, mains-only second (order matters; this
    /// order drops external nodes before folding sub-artifacts into
    /// their owners).
    ///
    /// # Errors
    ///
    /// Propagates corpus, construction, and filter errors.
    pub fn query(corpus: &Corpus, settings: &BuildSettings) -> Result<Self, GraphError> {
        let graph = DependencyGraph::build(corpus, settings)?
            .filter_local()?
            .filter_main_packages(corpus)?;
        Self::project(&graph)
    }
}
