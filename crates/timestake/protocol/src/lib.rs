//! Timestake protocol engine.
//!
//! Creators lock stake behind a time-bounded goal, submit proof before the
//! deadline, and a panel of staked judges votes inside a fixed review
//! window. Finalization returns the stake with a bonus from the reward pool
//! on a strict majority of yes votes, and slashes it into the pool otherwise.
//! Judges earn or lose reputation according to whether their vote matched
//! the outcome.
//!
//! Every operation runs as an optimistic transaction over a
//! [`timestake_storage::LedgerStore`]; see [`ProtocolEngine`].

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod clock;
pub mod economics;
mod engine;
mod error;
mod goals;
mod judges;
pub mod params;
mod query;
mod registry;
mod txn;
mod votes;

#[cfg(test)]
mod testkit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use economics::Settlement;
pub use engine::ProtocolEngine;
pub use error::{ProtocolError, ProtocolResult};
pub use goals::FinalizedGoal;
pub use params::{EngineSettings, ParamsError, ProtocolParams, MAX_REVIEW_WINDOW_SECS};
pub use query::{GoalFilter, JudgeFilter};

pub use timestake_types::{
    Account, Amount, DomainEvent, GlobalRegistry, Goal, GoalId, GoalStatus, Judge, Principal,
    ProofType, ReputationReceipt, VoteRecord,
};
