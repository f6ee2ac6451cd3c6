//! Vote ledger and live tally engine.
//!
//! A vote attempt enters the [`AdmissionGate`], which validates it against
//! the store, commits it in one store transaction while holding the
//! category's [`TallyCache`] entry, applies the new counter to the cache and
//! publishes the refreshed snapshot through the [`BroadcastHub`]. The
//! [`ResultProjector`] serves ranked read-only views and never touches the
//! write path. [`Catalog`] manages the category/candidate lifecycle and keeps
//! the cache and hub in step with it. [`VoteLedger`] wires everything together.

pub mod broadcast;
pub mod catalog;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod metrics;
pub mod projector;
pub mod tally_cache;

pub use broadcast::{BroadcastHub, TallySubscription};
pub use catalog::{BallotCandidate, BallotCategory, Catalog, CategoryView};
pub use error::{AdmissionError, CatalogError};
pub use gate::{AdmissionGate, VoteReceipt};
pub use ledger::VoteLedger;
pub use metrics::LedgerMetrics;
pub use projector::{Projection, ResultProjector, Standing};
pub use tally_cache::TallyCache;
