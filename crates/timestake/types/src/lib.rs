//! # timestake-types
//!
//! Shared vocabulary for the Timestake commitment protocol:
//!
//! - **Principals**: opaque 32-byte addresses of authorised callers
//! - **Record keys**: deterministic identities derived from logical fields,
//!   so that "at most one record per key" doubles as the uniqueness rule for
//!   goals, judges, votes and reputation scoring
//! - **Records**: `GlobalRegistry`, `Goal`, `Judge`, `VoteRecord`,
//!   `ReputationReceipt` and the native value `Account`
//! - **Domain events**: the log through which outside collaborators observe
//!   state changes
//!
//! ## Invariants carried by these types
//!
//! - `0 <= Goal.yes_votes <= Goal.total_votes`
//! - Goal status only moves along `Active -> PendingVerification ->
//!   {Completed | Failed}`, or `Active -> Cancelled`
//! - A Judge's stake is either the full registry minimum or zero

#![deny(unsafe_code)]

mod event;
mod key;
mod principal;
mod record;
mod records;

pub use event::DomainEvent;
pub use key::{RecordKey, RecordKeyParseError, RecordKind};
pub use principal::{Principal, PrincipalParseError};
pub use record::{LedgerRecord, Record};
pub use records::{
    Account, GlobalRegistry, Goal, GoalId, GoalStatus, Judge, ProofType, ReputationReceipt,
    VoteRecord,
};

/// Native value amount in base units.
pub type Amount = u64;

/// Basis-point denominator (100% = 10_000 bps).
pub const BPS_DENOMINATOR: u64 = 10_000;
