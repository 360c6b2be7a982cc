//! Artifact Record - files attached to a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Artifact Record describes one file stored under a run's artifact root.
///
/// `path` is relative to the run's artifact root and always uses `/`
/// separators (e.g. `plots/roc_curve.svg`).
///
/// ## CAS Hash Format
///
/// The `cas_hash` follows the format: `algorithm:hex_digest`, e.g.
/// `sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    path: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record stamped now.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        path: impl Into<String>,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            path: path.into(),
            cas_hash: cas_hash.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Describe `bytes` stored at `path`, hashing the content.
    #[must_use]
    pub fn for_bytes(run_id: impl Into<String>, path: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(run_id, path, cas_hash(bytes), bytes.len() as u64)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the path relative to the run's artifact root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the file name (last path component).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// `sha256:<hex>` digest of `bytes`.
#[must_use]
pub fn cas_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_record_for_bytes() {
        let artifact = ArtifactRecord::for_bytes("run-1", "reports/report.txt", b"hello");
        assert_eq!(artifact.run_id(), "run-1");
        assert_eq!(artifact.path(), "reports/report.txt");
        assert_eq!(artifact.file_name(), "report.txt");
        assert_eq!(artifact.size_bytes(), 5);
        assert_eq!(
            artifact.cas_hash(),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_empty_content_hash() {
        assert_eq!(
            cas_hash(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
