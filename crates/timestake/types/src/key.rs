use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::principal::Principal;
use crate::records::GoalId;

/// The kinds of record the ledger holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Registry,
    Goal,
    Judge,
    Vote,
    Account,
    ReputationReceipt,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Registry,
        RecordKind::Goal,
        RecordKind::Judge,
        RecordKind::Vote,
        RecordKind::Account,
        RecordKind::ReputationReceipt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Registry => "registry",
            RecordKind::Goal => "goal",
            RecordKind::Judge => "judge",
            RecordKind::Vote => "vote",
            RecordKind::Account => "account",
            RecordKind::ReputationReceipt => "reputation_receipt",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = RecordKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RecordKeyParseError::UnknownKind(s.to_string()))
    }
}

/// Deterministic record identity.
///
/// The digest is a BLAKE3 hash over a domain tag, the record kind and the
/// logical key fields, so the same logical key always lands on the same
/// address. Creating a record at an occupied address fails in storage; that
/// is what makes goal ids, judge registrations and (goal, judge) votes
/// unique without any extra locking.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordKey {
    kind: RecordKind,
    digest: [u8; 32],
}

impl RecordKey {
    fn derive(kind: RecordKind, parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"timestake-record-v1:");
        hasher.update(kind.as_str().as_bytes());
        for part in parts {
            hasher.update(&(part.len() as u32).to_le_bytes());
            hasher.update(part);
        }
        Self {
            kind,
            digest: *hasher.finalize().as_bytes(),
        }
    }

    /// The singleton registry.
    pub fn registry() -> Self {
        Self::derive(RecordKind::Registry, &[b"global"])
    }

    pub fn goal(goal_id: GoalId) -> Self {
        Self::derive(RecordKind::Goal, &[&goal_id.0.to_le_bytes()])
    }

    pub fn judge(judge: &Principal) -> Self {
        Self::derive(RecordKind::Judge, &[judge.as_bytes()])
    }

    pub fn vote(goal_id: GoalId, judge: &Principal) -> Self {
        Self::derive(
            RecordKind::Vote,
            &[&goal_id.0.to_le_bytes(), judge.as_bytes()],
        )
    }

    /// Marker for a scored (goal, judge) vote.
    pub fn reputation_receipt(goal_id: GoalId, judge: &Principal) -> Self {
        Self::derive(
            RecordKind::ReputationReceipt,
            &[&goal_id.0.to_le_bytes(), judge.as_bytes()],
        )
    }

    pub fn account(owner: &Principal) -> Self {
        Self::derive(RecordKind::Account, &[owner.as_bytes()])
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// `"<kind>/<hex digest>"`, the form used as a primary key by backends.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.kind, hex::encode(self.digest))
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, hex::encode(&self.digest[..8]))
    }
}

impl std::fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordKey({})", self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordKeyParseError {
    #[error("record key must look like <kind>/<hex>: {0}")]
    Malformed(String),

    #[error("unknown record kind: {0}")]
    UnknownKind(String),

    #[error("invalid record digest: {0}")]
    InvalidDigest(String),
}

impl std::str::FromStr for RecordKey {
    type Err = RecordKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, digest_hex) = s
            .split_once('/')
            .ok_or_else(|| RecordKeyParseError::Malformed(s.to_string()))?;
        let kind = kind.parse::<RecordKind>()?;
        let mut digest = [0u8; 32];
        hex::decode_to_slice(digest_hex, &mut digest)
            .map_err(|e| RecordKeyParseError::InvalidDigest(e.to_string()))?;
        Ok(Self { kind, digest })
    }
}

impl TryFrom<String> for RecordKey {
    type Error = RecordKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordKey> for String {
    fn from(value: RecordKey) -> Self {
        value.storage_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_logical_key_same_address() {
        let judge = Principal::derive("judge");
        assert_eq!(RecordKey::goal(GoalId(7)), RecordKey::goal(GoalId(7)));
        assert_eq!(
            RecordKey::vote(GoalId(7), &judge),
            RecordKey::vote(GoalId(7), &judge)
        );
    }

    #[test]
    fn kinds_are_domain_separated() {
        let p = Principal::derive("someone");
        assert_ne!(RecordKey::judge(&p).digest(), RecordKey::account(&p).digest());
        assert_ne!(
            RecordKey::vote(GoalId(1), &p),
            RecordKey::vote(GoalId(2), &p)
        );
        assert_ne!(
            RecordKey::vote(GoalId(1), &p).digest(),
            RecordKey::reputation_receipt(GoalId(1), &p).digest()
        );
    }

    #[test]
    fn storage_key_parses_back() {
        let key = RecordKey::vote(GoalId(42), &Principal::derive("j"));
        let parsed: RecordKey = key.storage_key().parse().unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.kind(), RecordKind::Vote);
    }

    #[test]
    fn every_kind_parses_from_its_name() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>(), Ok(kind));
        }
        let key = RecordKey::reputation_receipt(GoalId(5), &Principal::derive("j"));
        assert_eq!(key.storage_key().parse::<RecordKey>(), Ok(key));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(matches!(
            "nonsense".parse::<RecordKey>(),
            Err(RecordKeyParseError::Malformed(_))
        ));
        assert!(matches!(
            "planet/00".parse::<RecordKey>(),
            Err(RecordKeyParseError::UnknownKind(_))
        ));
    }
}
