//! Shared data model for apkforge.
//!
//! This crate holds the types exchanged between the build reconciliation
//! engine, the dependency graph engine, and the external config loader:
//! the [`Arch`] enumeration and the [`PackageConfig`] definition model.
//!
//! Definitions are immutable once parsed; every engine receives them by
//! reference and never mutates them.

pub mod arch;
pub mod config;

pub use arch::Arch;
pub use config::{
    ConfigError, Contents, Dependencies, Environment, Package, PackageConfig, Subpackage,
};
