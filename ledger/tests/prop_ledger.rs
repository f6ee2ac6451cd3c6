mod common;

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use ballot_ledger::AdmissionError;
use ballot_types::TallySnapshot;

use common::{null_poll, voter};

#[derive(Clone, Debug)]
enum Op {
    Vote { voter: u8, candidate: usize },
    SetOpen(bool),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            8 => (0u8..12, 0usize..4).prop_map(|(voter, candidate)| Op::Vote { voter, candidate }),
            1 => any::<bool>().prop_map(Op::SetOpen),
        ],
        1..60,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The ledger agrees with a reference model of one-vote-per-voter.
    #[test]
    fn ledger_matches_reference_model(ops in ops()) {
        let (_store, poll) = null_poll(&["A", "B", "C"]);
        let ledger = &poll.ledger;
        let category = poll.category.id;
        let ids: Vec<_> = poll.candidates.iter().map(|c| c.id).collect();

        let mut open = true;
        let mut voted: HashSet<u8> = HashSet::new();
        let mut expected: HashMap<usize, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::SetOpen(o) => {
                    ledger.catalog().set_voting(category, o).unwrap();
                    open = o;
                }
                Op::Vote { voter: v, candidate } => {
                    // Index 3 is not a candidate of this category.
                    let candidate_id = ids.get(candidate).copied()
                        .unwrap_or(ballot_types::CandidateId::new(10_000));
                    let result = ledger.attempt_vote(&voter(format!("v{v}")), category, candidate_id);
                    let want = if !open {
                        Err(AdmissionError::CategoryNotOpen)
                    } else if voted.contains(&v) {
                        Err(AdmissionError::AlreadyVoted)
                    } else if candidate >= ids.len() {
                        Err(AdmissionError::CandidateNotFound)
                    } else {
                        Ok(())
                    };
                    match (&result, &want) {
                        (Ok(_), Ok(())) => {
                            voted.insert(v);
                            *expected.entry(candidate).or_default() += 1;
                        }
                        (Err(got), Err(w)) => prop_assert_eq!(got, w),
                        _ => prop_assert!(false, "got {:?}, expected {:?}", result, want),
                    }
                }
            }
        }

        let tally = ledger.get_tally(category).unwrap();
        for (i, id) in ids.iter().enumerate() {
            prop_assert_eq!(tally.votes_for(*id), Some(expected.get(&i).copied().unwrap_or(0)));
        }
        prop_assert_eq!(tally.sequence, voted.len() as u64);
    }

    /// Projections are ranked and identical on repeated calls.
    #[test]
    fn projection_is_ranked_and_stable(votes in prop::collection::vec((0u8..40, 0usize..3), 0..40)) {
        let (_store, poll) = null_poll(&["A", "B", "C"]);
        let category = poll.category.id;
        for (v, c) in votes {
            let _ = poll.ledger.attempt_vote(&voter(format!("v{v}")), category, poll.candidates[c].id);
        }
        let first = poll.ledger.project(category).unwrap();
        for pair in first.standings.windows(2) {
            prop_assert!(
                pair[0].votes > pair[1].votes
                    || (pair[0].votes == pair[1].votes && pair[0].candidate_id < pair[1].candidate_id)
            );
        }
        prop_assert_eq!(poll.ledger.project(category).unwrap(), first);
    }

    /// Every snapshot a subscriber observes is monotone and matches a
    /// prefix of the accepted votes.
    #[test]
    fn subscribers_observe_committed_prefixes(votes in prop::collection::vec((0u8..30, 0usize..3), 1..30)) {
        let (_store, poll) = null_poll(&["A", "B", "C"]);
        let category = poll.category.id;
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let mut sub = poll.ledger.subscribe(category).unwrap();

        let mut prefixes: Vec<TallySnapshot> = vec![poll.ledger.get_tally(category).unwrap()];
        let mut observed = Vec::new();
        for (v, c) in votes {
            let accepted = match poll.ledger.attempt_vote(&voter(format!("v{v}")), category, poll.candidates[c].id) {
                Ok(receipt) => {
                    prefixes.push(receipt.tally);
                    true
                }
                Err(_) => false,
            };
            // Drain only some commits so that others coalesce.
            if accepted && v % 3 == 0 {
                observed.push(rt.block_on(sub.next()).unwrap());
            }
        }
        observed.push(rt.block_on(async {
            // After the last commit the newest state is always delivered.
            let mut last = sub.latest().unwrap();
            while last.sequence < prefixes.last().unwrap().sequence {
                last = sub.next().await.unwrap();
            }
            last
        }));

        for pair in observed.windows(2) {
            prop_assert!(pair[1].sequence >= pair[0].sequence);
            for entry in &pair[0].entries {
                prop_assert!(pair[1].votes_for(entry.candidate_id).unwrap_or(0) >= entry.votes);
            }
        }
        for snapshot in &observed {
            prop_assert!(prefixes.contains(snapshot), "phantom snapshot {:?}", snapshot);
        }
        prop_assert_eq!(observed.last(), prefixes.last());
    }
}
