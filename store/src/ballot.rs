//! Vote participation storage trait.

use crate::StoreError;
use ballot_types::{CandidateId, CategoryId, VoterId};

/// A single vote attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub voter: VoterId,
    pub category: CategoryId,
    pub candidate: CandidateId,
}

/// Result of [`BallotStore::commit_vote`].
///
/// Everything except `Committed` means nothing was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The vote was recorded; `votes` is the candidate's new counter.
    Committed { votes: u64 },
    CategoryNotOpen,
    AlreadyVoted,
    CandidateNotFound,
}

/// Trait for the vote participation records and the vote commit itself.
pub trait BallotStore {
    /// Whether `voter` already has a participation record in `category`.
    fn has_voted(&self, voter: &VoterId, category: CategoryId) -> Result<bool, StoreError>;

    /// Categories `voter` has voted in, in id order.
    fn voted_categories(&self, voter: &VoterId) -> Result<Vec<CategoryId>, StoreError>;

    /// Number of participation records in `category`.
    fn participation_count(&self, category: CategoryId) -> Result<u64, StoreError>;

    /// Atomically validate and record a vote.
    ///
    /// In one storage transaction: check the category is open, the voter has
    /// no participation record for it, and the candidate belongs to it (in
    /// that order); then increment the candidate counter by one, record the
    /// voter against the candidate, and insert the `(category, voter)`
    /// participation record.
    fn commit_vote(&self, ballot: &Ballot) -> Result<CommitOutcome, StoreError>;
}
