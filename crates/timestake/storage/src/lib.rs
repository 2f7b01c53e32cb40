//! Timestake storage abstractions.
//!
//! This crate defines the storage contract the protocol engine runs against:
//! - versioned records addressed by deterministic keys
//! - atomic write batches: create-if-absent and compare-and-swap updates
//!   commit together with the domain events they produce, or not at all
//! - an append-only, hash-linked event journal
//!
//! Design stance:
//! - The in-memory backend is the reference implementation and test substrate.
//! - PostgreSQL (feature `postgres`) is the durable source of truth.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
mod journal;
pub mod memory;
mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use journal::{compute_entry_hash, verify_chain};
pub use memory::InMemoryLedgerStore;
pub use model::{
    CommitReceipt, JournalEntry, JournalIntegrity, QueryWindow, StoredRecord, WriteBatch, WriteOp,
};
pub use traits::{EventJournal, LedgerStore, RecordStore};
