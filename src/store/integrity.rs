//! SHA-256 integrity manifest for externally-sourced blobs (spec.md §4.2).
//!
//! Any blob loaded from an external source (bulk market CSV, universe JSON
//! cache) is checked against a pinned manifest before being applied.
//! Mismatches fail the load and leave the previous state intact. An
//! unpinned-load override exists for development only and is logged at
//! warning level when used.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Manifest {
    /// Path (relative to the manifest's own directory) -> lowercase hex
    /// SHA-256 digest.
    pub checksums: HashMap<String, String>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading manifest at {}", path.as_ref().display()))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Verify `bytes` (identified by `manifest_key`, e.g. a relative file path)
/// against the manifest's pinned digest. `allow_unpinned` permits a missing
/// manifest entry to pass (development only) and is itself logged.
pub fn verify(
    manifest: &Manifest,
    manifest_key: &str,
    bytes: &[u8],
    allow_unpinned: bool,
) -> Result<(), ToolError> {
    match manifest.checksums.get(manifest_key) {
        Some(expected) => {
            let actual = sha256_hex(bytes);
            if &actual != expected {
                return Err(ToolError::integrity_error(manifest_key));
            }
            Ok(())
        }
        None if allow_unpinned => {
            warn!(
                key = manifest_key,
                "loading unpinned external data — NOVAROUTE_ALLOW_UNPINNED is set"
            );
            Ok(())
        }
        None => Err(ToolError::integrity_error(manifest_key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_digest_passes() {
        let bytes = b"hello world";
        let digest = sha256_hex(bytes);
        let mut manifest = Manifest::default();
        manifest.checksums.insert("blob.csv".into(), digest);
        assert!(verify(&manifest, "blob.csv", bytes, false).is_ok());
    }

    #[test]
    fn mismatched_digest_fails() {
        let bytes = b"hello world";
        let mut manifest = Manifest::default();
        manifest
            .checksums
            .insert("blob.csv".into(), "0".repeat(64));
        let err = verify(&manifest, "blob.csv", bytes, false).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::IntegrityError);
    }

    #[test]
    fn missing_entry_fails_without_override() {
        let manifest = Manifest::default();
        assert!(verify(&manifest, "blob.csv", b"x", false).is_err());
    }

    #[test]
    fn missing_entry_passes_with_override() {
        let manifest = Manifest::default();
        assert!(verify(&manifest, "blob.csv", b"x", true).is_ok());
    }
}
