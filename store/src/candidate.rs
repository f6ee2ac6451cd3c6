//! Candidate storage trait.

use crate::StoreError;
use ballot_types::{CandidateId, CategoryId, VoterId};
use serde::{Deserialize, Serialize};

/// A stored candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub id: CandidateId,
    /// Owning category. Immutable once set.
    pub category: CategoryId,
    pub name: String,
    pub description: String,
    /// Committed vote counter; the source of truth for reads.
    pub votes: u64,
}

/// Input for [`CandidateStore::add_candidate`].
#[derive(Clone, Debug)]
pub struct NewCandidate {
    pub category: CategoryId,
    pub name: String,
    pub description: String,
}

/// Trait for candidate storage operations.
pub trait CandidateStore {
    /// Persist a new candidate with zero votes.
    ///
    /// Fails with [`StoreError::NotFound`] if the category does not exist.
    fn add_candidate(&self, candidate: &NewCandidate) -> Result<CandidateInfo, StoreError>;

    fn get_candidate(&self, id: CandidateId) -> Result<Option<CandidateInfo>, StoreError>;

    /// Candidates of a category in id order.
    fn list_candidates(&self, category: CategoryId) -> Result<Vec<CandidateInfo>, StoreError>;

    /// Voters recorded for a candidate (provenance only; never used for counting).
    fn candidate_voters(&self, id: CandidateId) -> Result<Vec<VoterId>, StoreError>;
}
