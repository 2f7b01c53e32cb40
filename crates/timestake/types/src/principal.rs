use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address of an authorised principal.
///
/// How a caller proves control of the address is decided by the external
/// signing collaborator; by the time a `Principal` reaches the protocol it is
/// already authorised. Serialized as a 64-character lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal([u8; 32]);

impl Principal {
    /// Wrap raw address bytes (e.g. an Ed25519 public key).
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a principal from a human-readable seed.
    ///
    /// Used for genesis allocations, demos and tests where no key pair exists.
    pub fn derive(seed: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"timestake-principal-v1:");
        hasher.update(seed.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short display form (first 8 bytes hex).
    pub fn short_id(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Principal({})", self.short_id())
    }
}

/// Failure to parse a principal from its hex form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrincipalParseError {
    #[error("principal must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("principal is not valid hex: {0}")]
    InvalidHex(String),
}

impl std::str::FromStr for Principal {
    type Err = PrincipalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(PrincipalParseError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| PrincipalParseError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Principal {
    type Error = PrincipalParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Principal> for String {
    fn from(value: Principal) -> Self {
        value.to_string()
    }
}
