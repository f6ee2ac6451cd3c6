//! Tally snapshots — the derived, ephemeral view of a category's vote counts.

use serde::{Deserialize, Serialize};

use crate::{CandidateId, CategoryId};

/// One candidate's line in a tally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub candidate_id: CandidateId,
    pub name: String,
    pub votes: u64,
}

/// Current vote distribution across a category's candidates.
///
/// `entries` are always ordered by votes descending, then candidate id
/// ascending, so two snapshots of the same committed state compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub category_id: CategoryId,
    /// Total committed votes in the category. Never decreases.
    pub sequence: u64,
    pub entries: Vec<TallyEntry>,
}

impl TallySnapshot {
    /// Build a snapshot from unordered entries.
    pub fn new(category_id: CategoryId, mut entries: Vec<TallyEntry>) -> Self {
        sort_entries(&mut entries);
        let sequence = entries.iter().map(|e| e.votes).sum();
        Self {
            category_id,
            sequence,
            entries,
        }
    }

    /// A snapshot of a category with no candidates.
    pub fn empty(category_id: CategoryId) -> Self {
        Self {
            category_id,
            sequence: 0,
            entries: Vec::new(),
        }
    }

    pub fn total_votes(&self) -> u64 {
        self.sequence
    }

    pub fn votes_for(&self, candidate: CandidateId) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.candidate_id == candidate)
            .map(|e| e.votes)
    }

    /// Whether publishing `self` after `previous` is a forward step.
    ///
    /// True when no candidate known to `previous` lost votes and `self`
    /// carries strictly more information: a higher sequence, or the same
    /// sequence with candidates `previous` did not have.
    pub fn supersedes(&self, previous: &TallySnapshot) -> bool {
        if self.category_id != previous.category_id {
            return false;
        }
        let regressed = previous
            .entries
            .iter()
            .any(|old| self.votes_for(old.candidate_id).unwrap_or(0) < old.votes);
        if regressed {
            return false;
        }
        if self.sequence > previous.sequence {
            return true;
        }
        self.sequence == previous.sequence
            && self
                .entries
                .iter()
                .any(|e| previous.votes_for(e.candidate_id).is_none())
    }
}

/// Votes descending, candidate id ascending.
pub fn sort_entries(entries: &mut [TallyEntry]) {
    entries.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });
}
