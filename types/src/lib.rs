//! Fundamental types for the ballot poll service.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! category and candidate identifiers, voter identities, timestamps, tally snapshots,
//! and input limits.

pub mod error;
pub mod id;
pub mod limits;
pub mod tally;
pub mod time;
pub mod voter;

pub use error::BallotError;
pub use id::{CandidateId, CategoryId};
pub use tally::{TallyEntry, TallySnapshot};
pub use time::Timestamp;
pub use voter::VoterId;
