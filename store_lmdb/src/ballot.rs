//! LMDB implementation of BallotStore.
//!
//! A vote commit is a single LMDB write transaction. LMDB admits one writer
//! at a time, so the open/participation/ownership checks and the three writes
//! below are serialised against every other commit in the environment.

use ballot_store::{Ballot, BallotStore, CommitOutcome, StoreError};
use ballot_types::{CategoryId, VoterId};

use crate::keys::{participation_key, voter_index_key, voter_index_prefix, ID_LEN};
use crate::{LmdbEnvironment, LmdbError};

impl BallotStore for LmdbEnvironment {
    fn has_voted(&self, voter: &VoterId, category: CategoryId) -> Result<bool, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let key = participation_key(category, voter);
        Ok(self
            .participation_db
            .get(&rtxn, &key)
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn voted_categories(&self, voter: &VoterId) -> Result<Vec<CategoryId>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let prefix = voter_index_prefix(voter);
        let mut categories = Vec::new();
        for entry in self
            .voter_index_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let category = key
                .get(prefix.len()..)
                .filter(|rest| rest.len() == ID_LEN)
                .and_then(CategoryId::from_slice)
                .ok_or_else(|| StoreError::Corruption("malformed voter index key".to_string()))?;
            categories.push(category);
        }
        Ok(categories)
    }

    fn participation_count(&self, category: CategoryId) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let prefix = category.to_be_bytes();
        let mut count = 0u64;
        for entry in self
            .participation_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            entry.map_err(LmdbError::from)?;
            count += 1;
        }
        Ok(count)
    }

    fn commit_vote(&self, ballot: &Ballot) -> Result<CommitOutcome, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;

        match self.read_category(&wtxn, ballot.category)? {
            Some(category) if category.is_open => {}
            _ => return Ok(CommitOutcome::CategoryNotOpen),
        }

        let participation = participation_key(ballot.category, &ballot.voter);
        if self
            .participation_db
            .get(&wtxn, &participation)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(CommitOutcome::AlreadyVoted);
        }

        let mut candidate = match self.read_candidate(&wtxn, ballot.candidate)? {
            Some(c) if c.category == ballot.category => c,
            _ => return Ok(CommitOutcome::CandidateNotFound),
        };

        candidate.votes = candidate.votes.checked_add(1).ok_or_else(|| {
            StoreError::Corruption(format!("vote counter overflow for {}", candidate.id))
        })?;
        self.write_candidate(&mut wtxn, &candidate)?;
        self.participation_db
            .put(&mut wtxn, &participation, &ballot.candidate.to_be_bytes())
            .map_err(LmdbError::from)?;
        self.voter_index_db
            .put(&mut wtxn, &voter_index_key(&ballot.voter, ballot.category), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        Ok(CommitOutcome::Committed {
            votes: candidate.votes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_store::{CandidateStore, CategoryStore, NewCandidate, NewCategory};
    use ballot_types::{CandidateId, Timestamp};

    fn open_test_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 20).unwrap();
        (dir, env)
    }

    fn setup(env: &LmdbEnvironment, name: &str, open: bool) -> (CategoryId, CandidateId) {
        let category = env
            .create_category(
                &NewCategory {
                    name: name.to_string(),
                    description: String::new(),
                    created_by: None,
                },
                Timestamp::new(1),
            )
            .unwrap()
            .id;
        let candidate = env
            .add_candidate(&NewCandidate {
                category,
                name: format!("{name} candidate"),
                description: String::new(),
            })
            .unwrap()
            .id;
        if open {
            env.set_open(category, true).unwrap();
        }
        (category, candidate)
    }

    fn ballot(voter: &str, category: CategoryId, candidate: CandidateId) -> Ballot {
        Ballot {
            voter: VoterId::parse(voter).unwrap(),
            category,
            candidate,
        }
    }

    #[test]
    fn commit_records_vote_and_participation() {
        let (_dir, env) = open_test_env();
        let (category, candidate) = setup(&env, "talks", true);

        let outcome = env.commit_vote(&ballot("alice", category, candidate)).unwrap();
        assert_eq!(outcome, CommitOutcome::Committed { votes: 1 });

        let alice = VoterId::parse("alice").unwrap();
        assert!(env.has_voted(&alice, category).unwrap());
        assert_eq!(env.voted_categories(&alice).unwrap(), vec![category]);
        assert_eq!(env.participation_count(category).unwrap(), 1);
        assert_eq!(env.candidate_voters(candidate).unwrap(), vec![alice]);
        assert_eq!(env.get_candidate(candidate).unwrap().unwrap().votes, 1);
    }

    #[test]
    fn second_vote_in_category_rejected() {
        let (_dir, env) = open_test_env();
        let (category, first) = setup(&env, "talks", true);
        let second = env
            .add_candidate(&NewCandidate {
                category,
                name: "other".to_string(),
                description: String::new(),
            })
            .unwrap()
            .id;

        env.commit_vote(&ballot("alice", category, first)).unwrap();
        let outcome = env.commit_vote(&ballot("alice", category, second)).unwrap();
        assert_eq!(outcome, CommitOutcome::AlreadyVoted);
        assert_eq!(env.get_candidate(second).unwrap().unwrap().votes, 0);
        assert_eq!(env.participation_count(category).unwrap(), 1);
    }

    #[test]
    fn closed_category_rejected_before_duplicate_check() {
        let (_dir, env) = open_test_env();
        let (category, candidate) = setup(&env, "talks", true);
        env.commit_vote(&ballot("alice", category, candidate)).unwrap();
        env.set_open(category, false).unwrap();

        let outcome = env.commit_vote(&ballot("alice", category, candidate)).unwrap();
        assert_eq!(outcome, CommitOutcome::CategoryNotOpen);
    }

    #[test]
    fn candidate_of_other_category_rejected() {
        let (_dir, env) = open_test_env();
        let (talks, _) = setup(&env, "talks", true);
        let (_, foreign) = setup(&env, "posters", true);

        let outcome = env.commit_vote(&ballot("alice", talks, foreign)).unwrap();
        assert_eq!(outcome, CommitOutcome::CandidateNotFound);
        assert!(!env
            .has_voted(&VoterId::parse("alice").unwrap(), talks)
            .unwrap());
    }

    #[test]
    fn unknown_category_is_not_open() {
        let (_dir, env) = open_test_env();
        let outcome = env
            .commit_vote(&ballot("alice", CategoryId::new(42), CandidateId::new(1)))
            .unwrap();
        assert_eq!(outcome, CommitOutcome::CategoryNotOpen);
    }

    #[test]
    fn voter_may_vote_once_per_category() {
        let (_dir, env) = open_test_env();
        let (a, ca) = setup(&env, "a", true);
        let (b, cb) = setup(&env, "b", true);

        assert!(matches!(
            env.commit_vote(&ballot("alice", a, ca)).unwrap(),
            CommitOutcome::Committed { .. }
        ));
        assert!(matches!(
            env.commit_vote(&ballot("alice", b, cb)).unwrap(),
            CommitOutcome::Committed { .. }
        ));
        let alice = VoterId::parse("alice").unwrap();
        assert_eq!(env.voted_categories(&alice).unwrap(), vec![a, b]);
    }

    #[test]
    fn delete_cascades_participation() {
        let (_dir, env) = open_test_env();
        let (category, candidate) = setup(&env, "talks", true);
        env.commit_vote(&ballot("alice", category, candidate)).unwrap();
        env.set_open(category, false).unwrap();

        assert_eq!(env.delete_category(category).unwrap(), 1);
        let alice = VoterId::parse("alice").unwrap();
        assert!(!env.has_voted(&alice, category).unwrap());
        assert!(env.voted_categories(&alice).unwrap().is_empty());
        assert!(env.get_candidate(candidate).unwrap().is_none());
    }

    #[test]
    fn votes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (category, candidate) = {
            let env = LmdbEnvironment::open(dir.path(), 16, 1 << 20).unwrap();
            let ids = setup(&env, "talks", true);
            env.commit_vote(&ballot("alice", ids.0, ids.1)).unwrap();
            env.sync().unwrap();
            ids
        };
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 20).unwrap();
        assert_eq!(env.get_candidate(candidate).unwrap().unwrap().votes, 1);
        assert!(env
            .has_voted(&VoterId::parse("alice").unwrap(), category)
            .unwrap());
    }
}
