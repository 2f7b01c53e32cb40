//! Optimistic read-validate-write transactions.
//!
//! A [`Transaction`] remembers the version of every record it read. Staged
//! writes become create-if-absent ops for records that were absent and
//! compare-and-swap updates for records that were present, so the store
//! rejects the batch if anything it depends on changed in between.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use timestake_storage::{LedgerStore, WriteBatch};
use timestake_types::{
    Account, Amount, DomainEvent, GlobalRegistry, LedgerRecord, Principal, Record, RecordKey,
};

use crate::error::{ProtocolError, ProtocolResult};

pub(crate) struct Transaction<'a> {
    store: &'a dyn LedgerStore,
    now: DateTime<Utc>,
    /// Version observed per key, `None` when the key was absent
    observed: HashMap<RecordKey, Option<u64>>,
    staged: Vec<Record>,
    events: Vec<DomainEvent>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a dyn LedgerStore, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            observed: HashMap::new(),
            staged: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The instant this attempt runs at.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Read a record, seeing this transaction's own staged writes first.
    pub(crate) async fn load<T: LedgerRecord>(&mut self, key: &RecordKey) -> ProtocolResult<Option<T>> {
        if let Some(staged) = self.staged.iter().find(|r| r.key() == *key) {
            return Ok(T::from_record(staged.clone()));
        }

        let stored = self.store.get(key).await?;
        match stored {
            Some(stored) => {
                self.observed.entry(*key).or_insert(Some(stored.version));
                Ok(Some(stored.decode::<T>()?))
            }
            None => {
                self.observed.entry(*key).or_insert(None);
                Ok(None)
            }
        }
    }

    pub(crate) async fn registry(&mut self) -> ProtocolResult<GlobalRegistry> {
        self.load::<GlobalRegistry>(&RecordKey::registry())
            .await?
            .ok_or(ProtocolError::NotInitialized)
    }

    /// Stage a write. Replaces an earlier staged write to the same key.
    pub(crate) fn put<T: LedgerRecord>(&mut self, value: T) {
        let record = value.into_record();
        let key = record.key();
        match self.staged.iter_mut().find(|r| r.key() == key) {
            Some(slot) => *slot = record,
            None => self.staged.push(record),
        }
    }

    pub(crate) fn emit(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub(crate) async fn balance(&mut self, owner: Principal) -> ProtocolResult<Amount> {
        Ok(self
            .load::<Account>(&RecordKey::account(&owner))
            .await?
            .map(|account| account.balance)
            .unwrap_or(0))
    }

    /// Take `amount` out of `owner`'s account.
    pub(crate) async fn debit(&mut self, owner: Principal, amount: Amount) -> ProtocolResult<Account> {
        let mut account = self
            .load::<Account>(&RecordKey::account(&owner))
            .await?
            .unwrap_or_else(|| Account::empty(owner));
        account.balance =
            account
                .balance
                .checked_sub(amount)
                .ok_or(ProtocolError::InsufficientFunds {
                    owner,
                    required: amount,
                    available: account.balance,
                })?;
        self.put(account.clone());
        Ok(account)
    }

    /// Add `amount` to `owner`'s account, opening it if needed.
    pub(crate) async fn credit(&mut self, owner: Principal, amount: Amount) -> ProtocolResult<Account> {
        let mut account = self
            .load::<Account>(&RecordKey::account(&owner))
            .await?
            .unwrap_or_else(|| Account::empty(owner));
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(ProtocolError::ArithmeticOverflow("account balance"))?;
        self.put(account.clone());
        Ok(account)
    }

    pub(crate) fn into_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::new(self.now);
        for record in self.staged {
            batch = match self.observed.get(&record.key()) {
                Some(Some(version)) => batch.update(*version, record),
                _ => batch.create(record),
            };
        }
        for event in self.events {
            batch = batch.emit(event);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timestake_storage::{InMemoryLedgerStore, RecordStore, WriteOp};

    #[tokio::test]
    async fn staged_writes_pick_create_or_update() {
        let store = InMemoryLedgerStore::new();
        let alice = Principal::derive("alice");
        let bob = Principal::derive("bob");
        store
            .commit(WriteBatch::new(Utc::now()).create(Account { owner: alice, balance: 10 }.into_record()))
            .await
            .unwrap();

        let mut txn = Transaction::new(&store, Utc::now());
        txn.debit(alice, 4).await.unwrap();
        txn.credit(bob, 4).await.unwrap();
        let batch = txn.into_batch();

        assert!(matches!(
            &batch.ops[0],
            WriteOp::Update { expected_version: 1, .. }
        ));
        assert!(matches!(&batch.ops[1], WriteOp::Create { .. }));
    }

    #[tokio::test]
    async fn reads_see_staged_writes() {
        let store = InMemoryLedgerStore::new();
        let alice = Principal::derive("alice");

        let mut txn = Transaction::new(&store, Utc::now());
        txn.credit(alice, 7).await.unwrap();
        txn.credit(alice, 3).await.unwrap();
        assert_eq!(txn.balance(alice).await.unwrap(), 10);

        let batch = txn.into_batch();
        assert_eq!(batch.ops.len(), 1);
    }

    #[tokio::test]
    async fn overdraft_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let alice = Principal::derive("alice");

        let mut txn = Transaction::new(&store, Utc::now());
        let err = txn.debit(alice, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InsufficientFunds {
                required: 1,
                available: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_registry_means_not_initialized() {
        let store = InMemoryLedgerStore::new();
        let mut txn = Transaction::new(&store, Utc::now());
        assert!(matches!(
            txn.registry().await.unwrap_err(),
            ProtocolError::NotInitialized
        ));
    }
}
