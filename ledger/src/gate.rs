//! Vote admission.
//!
//! An attempt is first pre-checked with plain reads so obvious rejections
//! never take the category lock. A legal-looking attempt then takes the
//! category's tally slot, and while holding it commits through
//! [`BallotStore::commit_vote`](ballot_store::BallotStore::commit_vote),
//! which re-validates all three preconditions inside the store transaction
//! under the `(category, voter)` uniqueness constraint. The slot is released
//! only after the cache has been updated and the snapshot published, so
//! snapshots of one category reach the hub in commit order.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use ballot_store::{Ballot, CommitOutcome, LedgerStore, StoreError};
use ballot_types::{CandidateId, CategoryId, TallySnapshot, VoterId};

use crate::tally_cache::lock_slot;
use crate::{AdmissionError, BroadcastHub, LedgerMetrics, TallyCache};

/// Proof of an accepted vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub category_id: CategoryId,
    pub candidate_id: CandidateId,
    /// The candidate's counter after this vote.
    pub votes: u64,
    /// The category's tally including this vote.
    pub tally: TallySnapshot,
}

pub struct AdmissionGate {
    store: Arc<dyn LedgerStore>,
    cache: Arc<TallyCache>,
    hub: Arc<BroadcastHub>,
    metrics: Arc<LedgerMetrics>,
}

impl AdmissionGate {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<TallyCache>,
        hub: Arc<BroadcastHub>,
        metrics: Arc<LedgerMetrics>,
    ) -> Self {
        Self {
            store,
            cache,
            hub,
            metrics,
        }
    }

    /// Admit or reject one vote. Blocks for at most the store round-trips.
    pub fn attempt_vote(
        &self,
        voter: &VoterId,
        category: CategoryId,
        candidate: CandidateId,
    ) -> Result<VoteReceipt, AdmissionError> {
        let started = Instant::now();
        let result = self.admit(voter, category, candidate);
        self.metrics
            .admission_latency_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(receipt) => {
                self.metrics.votes_accepted.inc();
                tracing::debug!(
                    voter = %voter,
                    category = %category,
                    candidate = %candidate,
                    votes = receipt.votes,
                    "vote accepted"
                );
            }
            Err(e) => {
                self.metrics
                    .votes_rejected
                    .with_label_values(&[e.code()])
                    .inc();
                match e {
                    AdmissionError::StoreUnavailable(msg) => tracing::warn!(
                        voter = %voter,
                        category = %category,
                        error = %msg,
                        "vote failed: store unavailable"
                    ),
                    AdmissionError::InternalInconsistency(msg) => tracing::error!(
                        voter = %voter,
                        category = %category,
                        error = %msg,
                        "vote failed: internal inconsistency"
                    ),
                    _ => tracing::debug!(
                        voter = %voter,
                        category = %category,
                        candidate = %candidate,
                        reason = e.code(),
                        "vote rejected"
                    ),
                }
            }
        }
        result
    }

    fn admit(
        &self,
        voter: &VoterId,
        category: CategoryId,
        candidate: CandidateId,
    ) -> Result<VoteReceipt, AdmissionError> {
        self.precheck(voter, category, candidate)?;

        let slot = self.cache.slot(category);
        let mut tally = lock_slot(&slot);
        self.cache
            .ensure_loaded(category, &mut tally)
            .map_err(|e| match e {
                // Deleted between the pre-check and the lock.
                StoreError::NotFound(_) => AdmissionError::CategoryNotOpen,
                other => other.into(),
            })?;

        let ballot = Ballot {
            voter: voter.clone(),
            category,
            candidate,
        };
        let votes = match self.store.commit_vote(&ballot)? {
            CommitOutcome::Committed { votes } => votes,
            CommitOutcome::CategoryNotOpen => return Err(AdmissionError::CategoryNotOpen),
            CommitOutcome::AlreadyVoted => return Err(AdmissionError::AlreadyVoted),
            CommitOutcome::CandidateNotFound => return Err(AdmissionError::CandidateNotFound),
        };

        self.cache
            .apply_delta(category, &mut tally, candidate, votes)?;
        let snapshot = tally.snapshot(category);
        let delivered = self.hub.publish(&snapshot);
        drop(tally);

        tracing::trace!(category = %category, delivered, "tally published");
        Ok(VoteReceipt {
            category_id: category,
            candidate_id: candidate,
            votes,
            tally: snapshot,
        })
    }

    /// Lock-free rejection of attempts that are already illegal, in the
    /// order open, not-yet-voted, candidate ownership.
    fn precheck(
        &self,
        voter: &VoterId,
        category: CategoryId,
        candidate: CandidateId,
    ) -> Result<(), AdmissionError> {
        match self.store.get_category(category)? {
            Some(info) if info.is_open => {}
            _ => return Err(AdmissionError::CategoryNotOpen),
        }
        if self.store.has_voted(voter, category)? {
            return Err(AdmissionError::AlreadyVoted);
        }
        match self.store.get_candidate(candidate)? {
            Some(c) if c.category == category => Ok(()),
            _ => Err(AdmissionError::CandidateNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_nullables::NullStore;
    use ballot_store::{
        BallotStore, CandidateInfo, CandidateStore, CategoryInfo, CategoryStore, NewCandidate,
        NewCategory,
    };
    use ballot_types::Timestamp;

    struct Fixture {
        store: Arc<NullStore>,
        gate: AdmissionGate,
        hub: Arc<BroadcastHub>,
        metrics: Arc<LedgerMetrics>,
        category: CategoryId,
        a: CandidateId,
        b: CandidateId,
    }

    fn gate_over(store: Arc<dyn LedgerStore>) -> (AdmissionGate, Arc<BroadcastHub>, Arc<LedgerMetrics>) {
        let metrics = Arc::new(LedgerMetrics::new());
        let cache = Arc::new(TallyCache::new(store.clone(), metrics.clone()));
        let hub = Arc::new(BroadcastHub::new(metrics.live_subscribers.clone()));
        let gate = AdmissionGate::new(store, cache, hub.clone(), metrics.clone());
        (gate, hub, metrics)
    }

    fn seed(store: &NullStore) -> (CategoryId, CandidateId, CandidateId) {
        let category = store
            .create_category(
                &NewCategory {
                    name: "Best Talk".into(),
                    description: String::new(),
                    created_by: None,
                },
                Timestamp::new(1),
            )
            .unwrap()
            .id;
        let add = |name: &str| {
            store
                .add_candidate(&NewCandidate {
                    category,
                    name: name.into(),
                    description: String::new(),
                })
                .unwrap()
                .id
        };
        let (a, b) = (add("A"), add("B"));
        store.set_open(category, true).unwrap();
        (category, a, b)
    }

    fn fixture() -> Fixture {
        let store = Arc::new(NullStore::new());
        let (category, a, b) = seed(&store);
        let (gate, hub, metrics) = gate_over(store.clone());
        Fixture {
            store,
            gate,
            hub,
            metrics,
            category,
            a,
            b,
        }
    }

    fn voter(id: &str) -> VoterId {
        VoterId::parse(id).unwrap()
    }

    #[test]
    fn accepted_vote_returns_updated_tally() {
        let f = fixture();
        let receipt = f.gate.attempt_vote(&voter("u1"), f.category, f.a).unwrap();
        assert_eq!(receipt.votes, 1);
        assert_eq!(receipt.tally.votes_for(f.a), Some(1));
        assert_eq!(receipt.tally.votes_for(f.b), Some(0));
        assert_eq!(f.metrics.votes_accepted.get(), 1);
    }

    #[test]
    fn rejection_order_is_open_then_voted_then_candidate() {
        let f = fixture();
        f.gate.attempt_vote(&voter("u1"), f.category, f.a).unwrap();

        let foreign = CandidateId::new(999);
        assert_eq!(
            f.gate.attempt_vote(&voter("u1"), f.category, foreign),
            Err(AdmissionError::AlreadyVoted)
        );
        assert_eq!(
            f.gate.attempt_vote(&voter("u2"), f.category, foreign),
            Err(AdmissionError::CandidateNotFound)
        );
        f.store.set_open(f.category, false).unwrap();
        assert_eq!(
            f.gate.attempt_vote(&voter("u1"), f.category, foreign),
            Err(AdmissionError::CategoryNotOpen)
        );
        assert_eq!(
            f.metrics
                .votes_rejected
                .with_label_values(&["CATEGORY_NOT_OPEN"])
                .get(),
            1
        );
    }

    #[test]
    fn rejections_leave_state_untouched() {
        let f = fixture();
        f.gate.attempt_vote(&voter("u1"), f.category, f.a).unwrap();
        let commits = f.store.commit_count();
        let _ = f.gate.attempt_vote(&voter("u1"), f.category, f.b);
        assert_eq!(f.store.commit_count(), commits);
        assert_eq!(f.store.get_candidate(f.b).unwrap().unwrap().votes, 0);
    }

    #[test]
    fn store_outage_is_retryable_and_commits_nothing() {
        let f = fixture();
        f.store.set_unavailable(true);
        let err = f
            .gate
            .attempt_vote(&voter("u1"), f.category, f.a)
            .unwrap_err();
        assert!(err.is_retryable());
        f.store.set_unavailable(false);
        assert_eq!(f.store.commit_count(), 0);
        assert!(f.gate.attempt_vote(&voter("u1"), f.category, f.a).is_ok());
    }

    #[test]
    fn retry_after_lost_ack_reports_already_voted() {
        let f = fixture();
        f.store.fail_after_next_commit();
        let first = f
            .gate
            .attempt_vote(&voter("u1"), f.category, f.a)
            .unwrap_err();
        assert_eq!(first.code(), "STORE_UNAVAILABLE");

        let retry = f.gate.attempt_vote(&voter("u1"), f.category, f.a);
        assert_eq!(retry, Err(AdmissionError::AlreadyVoted));
        assert_eq!(f.store.get_candidate(f.a).unwrap().unwrap().votes, 1);

        // The cache catches up on the next commit.
        let receipt = f.gate.attempt_vote(&voter("u2"), f.category, f.a).unwrap();
        assert_eq!(receipt.tally.votes_for(f.a), Some(2));
    }

    #[tokio::test]
    async fn accepted_vote_is_published() {
        let f = fixture();
        let mut sub = f.hub.subscribe(f.category, None);
        f.gate.attempt_vote(&voter("u1"), f.category, f.b).unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.votes_for(f.b), Some(1));
        assert_eq!(snapshot.sequence, 1);
    }

    #[tokio::test]
    async fn rejected_vote_is_not_published() {
        let f = fixture();
        let sub = f.hub.subscribe(f.category, None);
        let _ = f.gate.attempt_vote(&voter("u1"), f.category, CandidateId::new(77));
        assert_eq!(sub.latest(), None);
    }

    /// Delegates to a NullStore but reports every candidate at zero votes,
    /// so a committed count can never be confirmed by a resync.
    struct StaleReads(NullStore);

    impl CategoryStore for StaleReads {
        fn create_category(&self, c: &NewCategory, now: Timestamp) -> Result<CategoryInfo, StoreError> {
            self.0.create_category(c, now)
        }
        fn get_category(&self, id: CategoryId) -> Result<Option<CategoryInfo>, StoreError> {
            self.0.get_category(id)
        }
        fn set_open(&self, id: CategoryId, open: bool) -> Result<CategoryInfo, StoreError> {
            self.0.set_open(id, open)
        }
        fn delete_category(&self, id: CategoryId) -> Result<usize, StoreError> {
            self.0.delete_category(id)
        }
        fn iter_categories(&self) -> Result<Vec<CategoryInfo>, StoreError> {
            self.0.iter_categories()
        }
    }

    impl CandidateStore for StaleReads {
        fn add_candidate(&self, c: &NewCandidate) -> Result<CandidateInfo, StoreError> {
            self.0.add_candidate(c)
        }
        fn get_candidate(&self, id: CandidateId) -> Result<Option<CandidateInfo>, StoreError> {
            self.0.get_candidate(id)
        }
        fn list_candidates(&self, category: CategoryId) -> Result<Vec<CandidateInfo>, StoreError> {
            let mut list = self.0.list_candidates(category)?;
            for c in &mut list {
                c.votes = 0;
            }
            Ok(list)
        }
        fn candidate_voters(&self, id: CandidateId) -> Result<Vec<VoterId>, StoreError> {
            self.0.candidate_voters(id)
        }
    }

    impl BallotStore for StaleReads {
        fn has_voted(&self, voter: &VoterId, category: CategoryId) -> Result<bool, StoreError> {
            self.0.has_voted(voter, category)
        }
        fn voted_categories(&self, voter: &VoterId) -> Result<Vec<CategoryId>, StoreError> {
            self.0.voted_categories(voter)
        }
        fn participation_count(&self, category: CategoryId) -> Result<u64, StoreError> {
            self.0.participation_count(category)
        }
        fn commit_vote(&self, ballot: &Ballot) -> Result<CommitOutcome, StoreError> {
            self.0.commit_vote(ballot)
        }
    }

    #[test]
    fn unconfirmable_commit_is_internal_inconsistency() {
        let inner = NullStore::new();
        let (category, a, _) = seed(&inner);
        let store = Arc::new(StaleReads(inner));
        let (gate, _hub, _metrics) = gate_over(store.clone());

        // First vote: cache 0 -> committed 1, in step.
        gate.attempt_vote(&voter("u1"), category, a).unwrap();
        // Cache says 1 (no resync yet); second commit reports 2, still in step.
        gate.attempt_vote(&voter("u2"), category, a).unwrap();

        // Force a resync that reads the stale counters.
        store.0.overwrite_votes(a, 5);
        let err = gate.attempt_vote(&voter("u3"), category, a).unwrap_err();
        assert_eq!(err.code(), "INTERNAL_INCONSISTENCY");
        assert!(!err.is_retryable());
        // The vote did commit; a retry is answered from the participation record.
        assert_eq!(
            gate.attempt_vote(&voter("u3"), category, a),
            Err(AdmissionError::AlreadyVoted)
        );
    }
}
