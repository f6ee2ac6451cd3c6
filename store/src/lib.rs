//! Abstract storage traits for the ballot ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod ballot;
pub mod candidate;
pub mod category;
pub mod error;
pub mod meta;

pub use ballot::{Ballot, BallotStore, CommitOutcome};
pub use candidate::{CandidateInfo, CandidateStore, NewCandidate};
pub use category::{CategoryInfo, CategoryStore, NewCategory};
pub use error::StoreError;
pub use meta::MetaStore;

/// Everything the ledger needs from its backing store.
pub trait LedgerStore: CategoryStore + CandidateStore + BallotStore + Send + Sync {}

impl<T> LedgerStore for T where T: CategoryStore + CandidateStore + BallotStore + Send + Sync {}
