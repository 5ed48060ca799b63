//! Top-level reconciliation: bring actual build artifacts in line with a
//! declared configuration.
//!
//! Hash, plan, dispatch. Identity and planning errors abort before any
//! build is attempted; dispatch errors carry the full per-architecture
//! failure set. The returned identity depends only on the configuration,
//! so a no-op reconciliation (everything skipped) returns the same token
//! as the run that originally built the artifacts.

use std::sync::Arc;

use apkforge_schema::PackageConfig;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{self, DispatchError};
use crate::engine::BuildEngine;
use crate::identity::{self, Identity, IdentityError};
use crate::planner::{self, PlanError};
use crate::settings::BuildSettings;

/// Errors that can occur during a reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Planning failed; no build was attempted.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// One or more architecture builds failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The configuration could not be hashed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Reconcile one package: build every architecture that needs it, then
/// return the configuration's content-derived identity.
///
/// Idempotent: when every target artifact already exists and
/// force-rebuild is not set, zero builds are invoked and the identity is
/// unchanged from the previous run.
///
/// # Errors
///
/// Returns [`ReconcileError::Plan`] before any build is attempted,
/// [`ReconcileError::Dispatch`] with the aggregated per-arch failures,
/// or [`ReconcileError::Identity`] if hashing fails.
pub async fn reconcile(
    config: &PackageConfig,
    settings: &BuildSettings,
    engine: Arc<dyn BuildEngine>,
    cancel: CancellationToken,
) -> Result<Identity, ReconcileError> {
    let id = identity::digest(config)?;
    let plans = planner::plan(config, settings)?;
    let builds = plans.iter().filter(|p| p.is_build()).count();
    tracing::debug!(
        package = %config.package.name,
        planned = plans.len(),
        builds,
        "reconciling"
    );

    let outcome = dispatch::dispatch(&config.package.name, plans, engine, cancel).await?;
    tracing::debug!(
        package = %config.package.name,
        built = outcome.built.len(),
        skipped = outcome.skipped.len(),
        "reconciliation complete"
    );

    Ok(id)
}
