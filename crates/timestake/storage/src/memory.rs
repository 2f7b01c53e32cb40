//! In-memory reference implementation of the ledger storage traits.
//!
//! Records and journal share one lock, so a commit is atomic with respect to
//! every other reader and writer. Deterministic and test-friendly; production
//! deployments should use the PostgreSQL backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use timestake_types::{RecordKey, RecordKind};
use tracing::debug;

use crate::journal::{chain_entry, verify_chain};
use crate::model::{
    CommitReceipt, JournalEntry, JournalIntegrity, QueryWindow, StoredRecord, WriteBatch, WriteOp,
};
use crate::traits::{EventJournal, RecordStore};
use crate::{StorageError, StorageResult};

#[derive(Default)]
struct LedgerState {
    records: BTreeMap<RecordKey, StoredRecord>,
    journal: Vec<JournalEntry>,
}

/// In-memory ledger storage adapter.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of every kind.
    pub fn len(&self) -> StorageResult<usize> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        Ok(guard.records.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl RecordStore for InMemoryLedgerStore {
    async fn get(&self, key: &RecordKey) -> StorageResult<Option<StoredRecord>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        Ok(guard.records.get(key).cloned())
    }

    async fn scan(
        &self,
        kind: RecordKind,
        window: QueryWindow,
    ) -> StorageResult<Vec<StoredRecord>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        let values = guard
            .records
            .values()
            .filter(|stored| stored.key.kind() == kind)
            .cloned()
            .collect::<Vec<_>>();
        Ok(window.apply(values))
    }

    async fn commit(&self, batch: WriteBatch) -> StorageResult<CommitReceipt> {
        batch.validate_shape()?;

        let mut guard = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;

        // Validate every precondition before touching anything.
        for op in &batch.ops {
            let key = op.key();
            match (op, guard.records.get(&key)) {
                (WriteOp::Create { .. }, Some(_)) => {
                    return Err(StorageError::AlreadyExists(key.to_string()));
                }
                (WriteOp::Update { .. }, None) => {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                (
                    WriteOp::Update {
                        expected_version, ..
                    },
                    Some(current),
                ) if current.version != *expected_version => {
                    return Err(StorageError::Conflict(format!(
                        "{} expected version {}, found {}",
                        key, expected_version, current.version
                    )));
                }
                _ => {}
            }
        }

        // Build journal entries before mutating so a hashing failure aborts cleanly.
        let mut appended: Vec<JournalEntry> = Vec::with_capacity(batch.events.len());
        for event in batch.events {
            let previous = appended.last().or(guard.journal.last());
            let entry = chain_entry(previous, batch.recorded_at, event)?;
            appended.push(entry);
        }

        let writes = batch.ops.len();
        for op in batch.ops {
            let (version, record) = match op {
                WriteOp::Create { record } => (1, record),
                WriteOp::Update {
                    expected_version,
                    record,
                } => (expected_version + 1, record),
            };
            let key = record.key();
            guard.records.insert(
                key,
                StoredRecord {
                    key,
                    version,
                    record,
                    updated_at: batch.recorded_at,
                },
            );
        }
        guard.journal.extend(appended.iter().cloned());

        debug!(
            writes,
            events = appended.len(),
            head = guard.journal.len(),
            "Committed ledger batch"
        );

        Ok(CommitReceipt { journal: appended })
    }
}

#[async_trait]
impl EventJournal for InMemoryLedgerStore {
    async fn events_since(
        &self,
        after_sequence: u64,
        limit: usize,
    ) -> StorageResult<Vec<JournalEntry>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        // Sequences are dense and start at 1, so the index is the sequence.
        let start = (after_sequence as usize).min(guard.journal.len());
        let tail = guard.journal[start..].to_vec();
        Ok(QueryWindow { limit, offset: 0 }.apply(tail))
    }

    async fn latest_event_hash(&self) -> StorageResult<Option<String>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        Ok(guard.journal.last().map(|e| e.hash.clone()))
    }

    async fn verify_journal(&self) -> StorageResult<JournalIntegrity> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        verify_chain(&guard.journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use timestake_types::{Account, DomainEvent, LedgerRecord, Principal};

    fn deposit_event(owner: Principal, amount: u64) -> DomainEvent {
        DomainEvent::Deposited {
            owner,
            amount,
            balance: amount,
        }
    }

    #[tokio::test]
    async fn create_then_update_bumps_version() {
        let store = InMemoryLedgerStore::new();
        let owner = Principal::derive("alice");

        let receipt = store
            .commit(
                WriteBatch::new(Utc::now())
                    .create(Account::empty(owner).into_record())
                    .emit(deposit_event(owner, 0)),
            )
            .await
            .unwrap();
        assert_eq!(receipt.journal.len(), 1);
        assert_eq!(receipt.journal[0].sequence, 1);
        let stored = store.get(&RecordKey::account(&owner)).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        store
            .commit(
                WriteBatch::new(Utc::now())
                    .update(1, Account { owner, balance: 50 }.into_record()),
            )
            .await
            .unwrap();

        let stored = store.get(&RecordKey::account(&owner)).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.decode::<Account>().unwrap().balance, 50);
    }

    #[tokio::test]
    async fn create_at_occupied_key_fails() {
        let store = InMemoryLedgerStore::new();
        let owner = Principal::derive("alice");
        let batch = || WriteBatch::new(Utc::now()).create(Account::empty(owner).into_record());

        store.commit(batch()).await.unwrap();
        let err = store.commit(batch()).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict_and_nothing_lands() {
        let store = InMemoryLedgerStore::new();
        let alice = Principal::derive("alice");
        let bob = Principal::derive("bob");

        store
            .commit(WriteBatch::new(Utc::now()).create(Account::empty(alice).into_record()))
            .await
            .unwrap();

        // Bob's create is valid, Alice's update is stale: the whole batch must abort.
        let err = store
            .commit(
                WriteBatch::new(Utc::now())
                    .create(Account::empty(bob).into_record())
                    .update(7, Account { owner: alice, balance: 1 }.into_record())
                    .emit(deposit_event(bob, 0)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert!(store.get(&RecordKey::account(&bob)).await.unwrap().is_none());
        assert!(store.events_since(0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let owner = Principal::derive("ghost");
        let err = store
            .commit(WriteBatch::new(Utc::now()).update(1, Account::empty(owner).into_record()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn journal_reads_are_sequence_based() {
        let store = InMemoryLedgerStore::new();
        let owner = Principal::derive("alice");
        for i in 1..=5 {
            store
                .commit(WriteBatch::new(Utc::now()).emit(deposit_event(owner, i)))
                .await
                .unwrap();
        }

        let tail = store.events_since(3, 0).await.unwrap();
        assert_eq!(
            tail.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![4, 5]
        );
        assert_eq!(store.events_since(0, 2).await.unwrap().len(), 2);
        assert!(store.events_since(10, 0).await.unwrap().is_empty());
        assert_eq!(
            store.latest_event_hash().await.unwrap(),
            Some(tail[1].hash.clone())
        );
        assert!(store.verify_journal().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn scan_filters_by_kind() {
        let store = InMemoryLedgerStore::new();
        let mut batch = WriteBatch::new(Utc::now());
        for name in ["a", "b", "c"] {
            batch = batch.create(Account::empty(Principal::derive(name)).into_record());
        }
        store.commit(batch).await.unwrap();

        assert_eq!(
            store
                .scan(RecordKind::Account, QueryWindow::all())
                .await
                .unwrap()
                .len(),
            3
        );
        assert!(store
            .scan(RecordKind::Goal, QueryWindow::all())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.len().unwrap(), 3);
    }
}
