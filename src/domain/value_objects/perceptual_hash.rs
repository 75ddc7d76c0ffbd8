use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Fixed-width similarity digest of a decoded raster.
///
/// Visually similar images produce hashes with a small Hamming distance.
/// Stored and exchanged as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PerceptualHash(Vec<u8>);

impl PerceptualHash {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_hex(hex: &str) -> Result<Self, DomainError> {
        let trimmed = hex.trim();
        hex::decode(trimmed)
            .map(Self)
            .map_err(|e| DomainError::InvalidPerceptualHash(format!("{}: {}", trimmed, e)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Width of the digest in bits
    pub fn bit_len(&self) -> u32 {
        self.0.len() as u32 * 8
    }

    /// Hamming distance to `other`.
    ///
    /// Digests of different widths are compared over their common prefix and
    /// every bit of the longer tail counts as a difference.
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        let common: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let tail = self.0.len().abs_diff(other.0.len()) as u32 * 8;
        common + tail
    }
}

impl std::fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for PerceptualHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for PerceptualHash {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<PerceptualHash> for String {
    fn from(value: PerceptualHash) -> Self {
        value.to_hex()
    }
}
