//! Build reconciliation and dependency graphing for apk-style packages.
//!
//! Two engines share this crate. The reconciliation engine takes a
//! parsed [`PackageConfig`](apkforge_schema::PackageConfig) and a target
//! architecture set, decides per architecture whether a build is needed,
//! runs the external build engine once per architecture that needs one,
//! and returns a content-derived [`Identity`] for change detection. The
//! graph engine loads a corpus of definitions and produces a directed
//! "needs" graph with composable filters and a deterministic adjacency
//! projection.
//!
//! The surrounding adapter layer (schema registration, state handling,
//! CLI wiring) is a caller concern: this crate consumes structured
//! configuration values and produces identities and graph summaries.

pub mod corpus;
pub mod dispatch;
pub mod engine;
pub mod filter;
pub mod graph;
pub mod identity;
pub mod paths;
pub mod planner;
pub mod reconcile;
pub mod settings;

pub use corpus::Corpus;
pub use dispatch::{BuildFailure, DispatchError, DispatchOutcome};
pub use engine::{BuildEngine, BuildOptions};
pub use filter::GraphSummary;
pub use graph::{DependencyGraph, GraphError, NodeId, Origin};
pub use identity::{Identity, IdentityError, digest};
pub use paths::{Presence, probe};
pub use planner::{BuildPlan, PlanAction, PlanError, plan};
pub use reconcile::{ReconcileError, reconcile};
pub use settings::BuildSettings;
