//! Artifact digests.

use serde::{Deserialize, Serialize};

/// BLAKE3 digest of a finished archive, as lowercase hex.
///
/// Reported per target in build summaries; two builds from identical inputs
/// must agree on this value (the reproducibility property made observable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactDigest(String);

impl ArtifactDigest {
    /// Hash `bytes` and return the digest.
    pub fn of(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Return the digest as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for compact display.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl std::fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArtifactDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_identical_digest() {
        let a = ArtifactDigest::of(b"same bytes");
        let b = ArtifactDigest::of(b"same bytes");
        assert_eq!(a, b);
        assert_eq!(a.short().len(), 8);
        assert_ne!(a, ArtifactDigest::of(b"other bytes"));
    }
}
