#![allow(dead_code)]

use std::sync::Arc;

use ballot_ledger::VoteLedger;
use ballot_nullables::{NullClock, NullStore};
use ballot_store::{CandidateInfo, CategoryInfo, LedgerStore};
use ballot_types::VoterId;

pub struct Poll {
    pub ledger: Arc<VoteLedger>,
    pub category: CategoryInfo,
    pub candidates: Vec<CandidateInfo>,
}

/// An open category with the given candidates over `store`.
pub fn open_poll(store: Arc<dyn LedgerStore>, name: &str, candidates: &[&str]) -> Poll {
    let ledger = Arc::new(VoteLedger::new(store));
    let clock = NullClock::new(1_000);
    let category = ledger
        .catalog()
        .create_category(name, None, None, clock.now())
        .unwrap();
    let candidates = candidates
        .iter()
        .map(|c| ledger.catalog().add_candidate(category.id, c, None).unwrap())
        .collect();
    let category = ledger.catalog().set_voting(category.id, true).unwrap();
    Poll {
        ledger,
        category,
        candidates,
    }
}

pub fn null_poll(candidates: &[&str]) -> (Arc<NullStore>, Poll) {
    let store = Arc::new(NullStore::new());
    let poll = open_poll(store.clone(), "poll", candidates);
    (store, poll)
}

pub fn voter(id: impl Into<String>) -> VoterId {
    VoterId::parse(id).unwrap()
}
