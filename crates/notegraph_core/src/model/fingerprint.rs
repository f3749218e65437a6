//! Content identity for outline lines.
//!
//! # Responsibility
//! - Derive a deterministic SHA-256 fingerprint from one source line.
//! - Validate fingerprints read back from storage.
//!
//! # Invariants
//! - Input is trimmed of leading/trailing whitespace and nothing else.
//! - The rendered form is always 64 lowercase hex characters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Rendered length of a fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Identity key of a note: SHA-256 of the trimmed raw line, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of one raw source line.
    ///
    /// Tags are part of the input, so changing a tag changes identity.
    pub fn of_line(line: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(line.trim().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for human-facing output and log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

/// Rejected fingerprint text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFingerprint(pub String);

impl Display for InvalidFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid fingerprint `{}`: expected {FINGERPRINT_HEX_LEN} lowercase hex characters",
            self.0
        )
    }
}

impl Error for InvalidFingerprint {}

impl FromStr for Fingerprint {
    type Err = InvalidFingerprint;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let valid = value.len() == FINGERPRINT_HEX_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidFingerprint(value.to_string()))
        }
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = InvalidFingerprint;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
