//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the node accepts votes.
//! Beyond opening every database, the check verifies that each category's
//! candidate counters add up to its participation records.

use std::path::Path;

use heed::types::Bytes;

use ballot_store::CategoryInfo;
use ballot_types::CandidateId;

use crate::environment::DATABASE_NAMES;
use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub categories_checked: u32,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check LMDB database integrity on startup.
///
/// Read failures and count mismatches are recorded in the report rather than
/// causing a hard error.
pub fn check_integrity(store: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        categories_checked: 0,
        errors: Vec::new(),
    };

    let env = store.env();
    let rtxn = env.read_txn()?;

    for &db_name in DATABASE_NAMES {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    let mut categories = Vec::new();
    for entry in store.categories_db.iter(&rtxn)? {
        let (_, val) = entry?;
        match bincode::deserialize::<CategoryInfo>(val) {
            Ok(info) => categories.push(info),
            Err(e) => report
                .errors
                .push(format!("undecodable category record: {}", e)),
        }
    }

    for category in &categories {
        report.categories_checked += 1;

        let mut counted = 0u64;
        let mut candidate_ids = Vec::new();
        for id in store.candidate_ids(&rtxn, category.id)? {
            match store.read_candidate(&rtxn, id)? {
                Some(c) if c.category == category.id => {
                    counted = counted.saturating_add(c.votes);
                    candidate_ids.push(id);
                }
                Some(_) => report.errors.push(format!(
                    "candidate {} indexed under category {} belongs elsewhere",
                    id, category.id
                )),
                None => report.errors.push(format!(
                    "category {} indexes missing candidate {}",
                    category.id, id
                )),
            }
        }

        let mut participations = 0u64;
        for entry in store
            .participation_db
            .prefix_iter(&rtxn, &category.id.to_be_bytes())?
        {
            let (_, val) = entry?;
            participations += 1;
            let owned = CandidateId::from_slice(val)
                .map(|c| candidate_ids.contains(&c))
                .unwrap_or(false);
            if !owned {
                report.errors.push(format!(
                    "participation in category {} points at a foreign candidate",
                    category.id
                ));
            }
        }

        if counted != participations {
            report.errors.push(format!(
                "category {} counts {} votes but has {} participation records",
                category.id, counted, participations
            ));
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_store::{Ballot, BallotStore, CandidateStore, CategoryStore, NewCandidate, NewCategory};
    use ballot_types::{Timestamp, VoterId};

    #[test]
    fn check_data_dir_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(&dir.path().join("absent")).is_ok());
    }

    #[test]
    fn check_data_dir_without_data_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(dir.path()).is_err());
    }

    #[test]
    fn populated_store_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 20).unwrap();
        let category = env
            .create_category(
                &NewCategory {
                    name: "talks".to_string(),
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
                name: "A".to_string(),
                description: String::new(),
            })
            .unwrap()
            .id;
        env.set_open(category, true).unwrap();
        for voter in ["alice", "bob"] {
            env.commit_vote(&Ballot {
                voter: VoterId::parse(voter).unwrap(),
                category,
                candidate,
            })
            .unwrap();
        }

        let report = check_integrity(&env).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.databases_checked, DATABASE_NAMES.len() as u32);
        assert_eq!(report.categories_checked, 1);
    }

    #[test]
    fn counter_drift_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 20).unwrap();
        let category = env
            .create_category(
                &NewCategory {
                    name: "talks".to_string(),
                    description: String::new(),
                    created_by: None,
                },
                Timestamp::new(1),
            )
            .unwrap()
            .id;
        let mut candidate = env
            .add_candidate(&NewCandidate {
                category,
                name: "A".to_string(),
                description: String::new(),
            })
            .unwrap();

        candidate.votes = 5;
        let mut wtxn = env.env().write_txn().unwrap();
        env.write_candidate(&mut wtxn, &candidate).unwrap();
        wtxn.commit().unwrap();

        let report = check_integrity(&env).unwrap();
        assert!(!report.is_healthy());
    }
}
