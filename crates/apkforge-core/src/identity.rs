//! Content-derived identity for change detection.
//!
//! An [`Identity`] is the SHA-256 digest of a value's canonical JSON
//! serialization. It is an opaque change-detection token for callers:
//! never a filesystem path, never a build argument. Two serializations
//! that differ only in map key order must hash identically, which is why
//! every map-shaped structure fed into [`digest`] uses `BTreeMap` (stable
//! iteration order) rather than `HashMap`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur while computing an identity.
///
/// Serialization failure here is a programmer error (an unsupported value
/// shape), not an expected runtime condition.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The value could not be serialized to canonical JSON.
    #[error("serializing value for identity: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A 64-character lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// The hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the identity of any serializable value.
///
/// Identical input serialization implies identical identity; any semantic
/// change reflected in the serialized form (package name, version, epoch,
/// environment contents, graph adjacency) changes the identity.
///
/// # Errors
///
/// Returns [`IdentityError::Serialize`] if the value cannot be serialized.
pub fn digest<T: Serialize>(value: &T) -> Result<Identity, IdentityError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(Identity(hex::encode(Sha256::digest(&bytes))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkforge_schema::PackageConfig;
    use std::collections::BTreeMap;

    const CONFIG: &str = r#"
package:
  name: minimal
  version: 0.0.1
  epoch: 3
environment:
  contents:
    packages:
      - build-base
"#;

    #[test]
    fn test_digest_is_stable() {
        let cfg = PackageConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(digest(&cfg).unwrap(), digest(&cfg).unwrap());
    }

    #[test]
    fn test_digest_shape() {
        let id = digest(&"hello").unwrap();
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_every_identity_field_is_significant() {
        let base = PackageConfig::from_yaml(CONFIG).unwrap();
        let base_id = digest(&base).unwrap();

        let mut renamed = base.clone();
        renamed.package.name = "maximal".into();
        assert_ne!(digest(&renamed).unwrap(), base_id);

        let mut reversioned = base.clone();
        reversioned.package.version = "0.0.2".into();
        assert_ne!(digest(&reversioned).unwrap(), base_id);

        let mut bumped = base.clone();
        bumped.package.epoch = 4;
        assert_ne!(digest(&bumped).unwrap(), base_id);

        let mut reenv = base.clone();
        reenv.environment.contents.packages.push("cmake".into());
        assert_ne!(digest(&reenv).unwrap(), base_id);
    }

    #[test]
    fn test_map_key_order_is_normalized() {
        // BTreeMap iteration order is independent of insertion order, so
        // logically-equal maps produce byte-identical serializations.
        let mut forward = BTreeMap::new();
        forward.insert("a", vec!["b"]);
        forward.insert("b", vec![]);

        let mut reverse = BTreeMap::new();
        reverse.insert("b", vec![]);
        reverse.insert("a", vec!["b"]);

        assert_eq!(digest(&forward).unwrap(), digest(&reverse).unwrap());
    }
}
