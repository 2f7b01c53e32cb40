use async_trait::async_trait;
use timestake_types::{RecordKey, RecordKind};

use crate::model::{
    CommitReceipt, JournalEntry, JournalIntegrity, QueryWindow, StoredRecord, WriteBatch,
};
use crate::StorageResult;

/// Versioned key -> record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get one record by key.
    async fn get(&self, key: &RecordKey) -> StorageResult<Option<StoredRecord>>;

    /// List all records of one kind in key order.
    async fn scan(&self, kind: RecordKind, window: QueryWindow)
        -> StorageResult<Vec<StoredRecord>>;

    /// Apply a batch atomically and append its events to the journal.
    ///
    /// Either every op and event lands or none does.
    async fn commit(&self, batch: WriteBatch) -> StorageResult<CommitReceipt>;
}

/// Append-only, hash-linked domain event log.
#[async_trait]
pub trait EventJournal: Send + Sync {
    /// Entries with `sequence > after_sequence`, oldest first. `limit == 0` means all.
    async fn events_since(
        &self,
        after_sequence: u64,
        limit: usize,
    ) -> StorageResult<Vec<JournalEntry>>;

    /// Hash of the newest entry.
    async fn latest_event_hash(&self) -> StorageResult<Option<String>>;

    /// Recompute the whole chain.
    async fn verify_journal(&self) -> StorageResult<JournalIntegrity>;
}

/// Unified storage bundle used by the protocol engine.
pub trait LedgerStore: RecordStore + EventJournal + Send + Sync {}

impl<T> LedgerStore for T where T: RecordStore + EventJournal + Send + Sync {}
