use serde::{Deserialize, Serialize};

use crate::key::{RecordKey, RecordKind};
use crate::records::{Account, GlobalRegistry, Goal, Judge, ReputationReceipt, VoteRecord};

/// Any record the ledger can hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Record {
    Registry(GlobalRegistry),
    Goal(Goal),
    Judge(Judge),
    Vote(VoteRecord),
    Account(Account),
    ReputationReceipt(ReputationReceipt),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Registry(_) => RecordKind::Registry,
            Record::Goal(_) => RecordKind::Goal,
            Record::Judge(_) => RecordKind::Judge,
            Record::Vote(_) => RecordKind::Vote,
            Record::Account(_) => RecordKind::Account,
            Record::ReputationReceipt(_) => RecordKind::ReputationReceipt,
        }
    }

    /// The deterministic key this record must be stored under.
    pub fn key(&self) -> RecordKey {
        match self {
            Record::Registry(r) => r.key(),
            Record::Goal(r) => r.key(),
            Record::Judge(r) => r.key(),
            Record::Vote(r) => r.key(),
            Record::Account(r) => r.key(),
            Record::ReputationReceipt(r) => r.key(),
        }
    }
}

/// A typed record with a deterministic identity.
pub trait LedgerRecord: Clone + Sized {
    const KIND: RecordKind;

    fn key(&self) -> RecordKey;

    fn into_record(self) -> Record;

    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! ledger_record {
    ($ty:ty, $variant:ident, |$this:ident| $key:expr) => {
        impl LedgerRecord for $ty {
            const KIND: RecordKind = RecordKind::$variant;

            fn key(&self) -> RecordKey {
                let $this = self;
                $key
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

ledger_record!(GlobalRegistry, Registry, |_r| RecordKey::registry());
ledger_record!(Goal, Goal, |g| RecordKey::goal(g.goal_id));
ledger_record!(Judge, Judge, |j| RecordKey::judge(&j.judge));
ledger_record!(VoteRecord, Vote, |v| RecordKey::vote(v.goal_id, &v.judge));
ledger_record!(Account, Account, |a| RecordKey::account(&a.owner));
ledger_record!(ReputationReceipt, ReputationReceipt, |r| {
    RecordKey::reputation_receipt(r.goal_id, &r.judge)
});
