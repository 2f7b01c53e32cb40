use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timestake_types::{DomainEvent, LedgerRecord, Record, RecordKey};
use uuid::Uuid;

use crate::{StorageError, StorageResult};

/// A record as persisted, with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: RecordKey,
    /// Starts at 1 on creation, bumped by every update
    pub version: u64,
    pub record: Record,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Decode into a typed record, failing if the stored kind differs.
    pub fn decode<T: LedgerRecord>(self) -> StorageResult<T> {
        let kind = self.record.kind();
        T::from_record(self.record).ok_or_else(|| {
            StorageError::InvariantViolation(format!(
                "record {} holds a {} where a {} was expected",
                self.key,
                kind,
                T::KIND
            ))
        })
    }
}

/// One write inside a batch. The key is always derived from the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Fails with `AlreadyExists` if the key is occupied.
    Create { record: Record },
    /// Fails with `Conflict` unless the stored version equals `expected_version`.
    Update {
        expected_version: u64,
        record: Record,
    },
}

impl WriteOp {
    pub fn key(&self) -> RecordKey {
        match self {
            WriteOp::Create { record } | WriteOp::Update { record, .. } => record.key(),
        }
    }

    pub fn record(&self) -> &Record {
        match self {
            WriteOp::Create { record } | WriteOp::Update { record, .. } => record,
        }
    }
}

/// Everything one protocol operation writes, applied all-or-nothing.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
    pub events: Vec<DomainEvent>,
    pub recorded_at: DateTime<Utc>,
}

impl WriteBatch {
    pub fn new(recorded_at: DateTime<Utc>) -> Self {
        Self {
            ops: Vec::new(),
            events: Vec::new(),
            recorded_at,
        }
    }

    pub fn create(mut self, record: Record) -> Self {
        self.ops.push(WriteOp::Create { record });
        self
    }

    pub fn update(mut self, expected_version: u64, record: Record) -> Self {
        self.ops.push(WriteOp::Update {
            expected_version,
            record,
        });
        self
    }

    pub fn emit(mut self, event: DomainEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Reject batches that touch the same key twice.
    pub(crate) fn validate_shape(&self) -> StorageResult<()> {
        let mut seen = std::collections::HashSet::with_capacity(self.ops.len());
        for op in &self.ops {
            let key = op.key();
            if !seen.insert(key) {
                return Err(StorageError::InvalidInput(format!(
                    "batch writes {} more than once",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Journal entries appended by this commit
    pub journal: Vec<JournalEntry>,
}

/// Tamper-evident journal entry. Hash and sequence are assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub event_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub event: DomainEvent,
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// Result of recomputing the journal hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalIntegrity {
    pub total_entries: u64,
    pub verified_entries: u64,
    /// First sequence whose hash or link does not check out
    pub first_broken_sequence: Option<u64>,
}

impl JournalIntegrity {
    pub fn is_clean(&self) -> bool {
        self.first_broken_sequence.is_none() && self.total_entries == self.verified_entries
    }
}

/// Generic query window for paged reads. `limit == 0` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timestake_types::{Account, Goal, Principal};

    #[test]
    fn batch_rejects_duplicate_keys() {
        let owner = Principal::derive("a");
        let batch = WriteBatch::new(Utc::now())
            .create(Account::empty(owner).into_record())
            .update(1, Account { owner, balance: 5 }.into_record());
        assert!(matches!(
            batch.validate_shape(),
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[test]
    fn decode_checks_kind() {
        let owner = Principal::derive("a");
        let stored = StoredRecord {
            key: RecordKey::account(&owner),
            version: 1,
            record: Account::empty(owner).into_record(),
            updated_at: Utc::now(),
        };
        assert!(stored.clone().decode::<Account>().is_ok());
        assert!(matches!(
            stored.decode::<Goal>(),
            Err(StorageError::InvariantViolation(_))
        ));
    }

    #[test]
    fn window_paging() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(QueryWindow::all().apply(items.clone()).len(), 10);
        assert_eq!(QueryWindow::page(3, 2).apply(items.clone()), vec![2, 3, 4]);
        assert!(QueryWindow::page(5, 20).apply(items).is_empty());
    }
}
