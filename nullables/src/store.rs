//! Nullable store — thread-safe in-memory storage for testing.
//!
//! All state sits behind one mutex, so `commit_vote` is atomic exactly like
//! an LMDB write transaction. Fault switches let tests drive the ledger
//! through store outages and lost acknowledgements.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use ballot_store::{
    Ballot, BallotStore, CandidateInfo, CandidateStore, CategoryInfo, CategoryStore,
    CommitOutcome, MetaStore, NewCandidate, NewCategory, StoreError,
};
use ballot_types::{CandidateId, CategoryId, Timestamp, VoterId};

#[derive(Default)]
struct State {
    categories: BTreeMap<CategoryId, CategoryInfo>,
    names: HashMap<String, CategoryId>,
    candidates: BTreeMap<CandidateId, CandidateInfo>,
    participation: BTreeMap<(CategoryId, VoterId), CandidateId>,
    meta: HashMap<String, Vec<u8>>,
    schema_version: u32,
    next_category: u64,
    next_candidate: u64,
}

/// An in-memory ledger store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    lose_next_ack: AtomicBool,
    commits: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            unavailable: AtomicBool::new(false),
            lose_next_ack: AtomicBool::new(false),
            commits: AtomicU64::new(0),
        }
    }

    /// While set, every operation fails with `StoreError::Backend`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The next successful vote commit is applied, then reported as a
    /// backend failure (the acknowledgement is "lost").
    pub fn fail_after_next_commit(&self) {
        self.lose_next_ack.store(true, Ordering::SeqCst);
    }

    /// Overwrite a candidate's stored counter behind the ledger's back.
    pub fn overwrite_votes(&self, candidate: CandidateId, votes: u64) {
        if let Some(c) = self.state.lock().unwrap().candidates.get_mut(&candidate) {
            c.votes = votes;
        }
    }

    /// Number of `commit_vote` calls that wrote a vote.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryStore for NullStore {
    fn create_category(
        &self,
        category: &NewCategory,
        now: Timestamp,
    ) -> Result<CategoryInfo, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if state.names.contains_key(&category.name) {
            return Err(StoreError::Duplicate(format!("category '{}'", category.name)));
        }
        state.next_category += 1;
        let id = CategoryId::new(state.next_category);
        let info = CategoryInfo {
            id,
            name: category.name.clone(),
            description: category.description.clone(),
            is_open: false,
            created_at: now,
            created_by: category.created_by.clone(),
        };
        state.names.insert(info.name.clone(), id);
        state.categories.insert(id, info.clone());
        Ok(info)
    }

    fn get_category(&self, id: CategoryId) -> Result<Option<CategoryInfo>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().categories.get(&id).cloned())
    }

    fn set_open(&self, id: CategoryId, open: bool) -> Result<CategoryInfo, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let info = state
            .categories
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("category {id}")))?;
        info.is_open = open;
        Ok(info.clone())
    }

    fn delete_category(&self, id: CategoryId) -> Result<usize, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let info = state
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("category {id}")))?;
        if info.is_open {
            return Err(StoreError::Conflict(format!("category {id} is open")));
        }
        state.categories.remove(&id);
        state.names.remove(&info.name);
        let before = state.candidates.len();
        state.candidates.retain(|_, c| c.category != id);
        let removed = before - state.candidates.len();
        state.participation.retain(|(category, _), _| *category != id);
        Ok(removed)
    }

    fn iter_categories(&self) -> Result<Vec<CategoryInfo>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .categories
            .values()
            .cloned()
            .collect())
    }
}

impl CandidateStore for NullStore {
    fn add_candidate(&self, candidate: &NewCandidate) -> Result<CandidateInfo, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if !state.categories.contains_key(&candidate.category) {
            return Err(StoreError::NotFound(format!(
                "category {}",
                candidate.category
            )));
        }
        state.next_candidate += 1;
        let info = CandidateInfo {
            id: CandidateId::new(state.next_candidate),
            category: candidate.category,
            name: candidate.name.clone(),
            description: candidate.description.clone(),
            votes: 0,
        };
        state.candidates.insert(info.id, info.clone());
        Ok(info)
    }

    fn get_candidate(&self, id: CandidateId) -> Result<Option<CandidateInfo>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().candidates.get(&id).cloned())
    }

    fn list_candidates(&self, category: CategoryId) -> Result<Vec<CandidateInfo>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .candidates
            .values()
            .filter(|c| c.category == category)
            .cloned()
            .collect())
    }

    fn candidate_voters(&self, id: CandidateId) -> Result<Vec<VoterId>, StoreError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        if !state.candidates.contains_key(&id) {
            return Err(StoreError::NotFound(format!("candidate {id}")));
        }
        Ok(state
            .participation
            .iter()
            .filter(|(_, candidate)| **candidate == id)
            .map(|((_, voter), _)| voter.clone())
            .collect())
    }
}

impl BallotStore for NullStore {
    fn has_voted(&self, voter: &VoterId, category: CategoryId) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .participation
            .contains_key(&(category, voter.clone())))
    }

    fn voted_categories(&self, voter: &VoterId) -> Result<Vec<CategoryId>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .participation
            .keys()
            .filter(|(_, v)| v == voter)
            .map(|(category, _)| *category)
            .collect())
    }

    fn participation_count(&self, category: CategoryId) -> Result<u64, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .participation
            .keys()
            .filter(|(c, _)| *c == category)
            .count() as u64)
    }

    fn commit_vote(&self, ballot: &Ballot) -> Result<CommitOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();

        match state.categories.get(&ballot.category) {
            Some(c) if c.is_open => {}
            _ => return Ok(CommitOutcome::CategoryNotOpen),
        }
        let key = (ballot.category, ballot.voter.clone());
        if state.participation.contains_key(&key) {
            return Ok(CommitOutcome::AlreadyVoted);
        }
        let votes = match state.candidates.get_mut(&ballot.candidate) {
            Some(c) if c.category == ballot.category => {
                c.votes = c.votes.checked_add(1).ok_or_else(|| {
                    StoreError::Corruption(format!("vote counter overflow for {}", c.id))
                })?;
                c.votes
            }
            _ => return Ok(CommitOutcome::CandidateNotFound),
        };
        state.participation.insert(key, ballot.candidate);
        self.commits.fetch_add(1, Ordering::SeqCst);

        if self.lose_next_ack.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend(
                "acknowledgement lost after commit".to_string(),
            ));
        }
        Ok(CommitOutcome::Committed { votes })
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .meta
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().meta.get(key).cloned())
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.state.lock().unwrap().meta.remove(key);
        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().schema_version)
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.check_available()?;
        self.state.lock().unwrap().schema_version = version;
        Ok(())
    }
}
