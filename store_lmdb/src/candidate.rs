//! LMDB implementation of CandidateStore.

use ballot_store::{CandidateInfo, CandidateStore, NewCandidate, StoreError};
use ballot_types::{CandidateId, CategoryId, VoterId};

use crate::keys::{category_candidate_key, voter_from_participation_key};
use crate::{LmdbEnvironment, LmdbError};

impl CandidateStore for LmdbEnvironment {
    fn add_candidate(&self, candidate: &NewCandidate) -> Result<CandidateInfo, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        if self.read_category(&wtxn, candidate.category)?.is_none() {
            return Err(StoreError::NotFound(format!(
                "category {}",
                candidate.category
            )));
        }

        let id = self.next_candidate_id(&mut wtxn)?;
        let info = CandidateInfo {
            id,
            category: candidate.category,
            name: candidate.name.clone(),
            description: candidate.description.clone(),
            votes: 0,
        };
        self.write_candidate(&mut wtxn, &info)?;
        self.category_candidates_db
            .put(&mut wtxn, &category_candidate_key(info.category, id), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(info)
    }

    fn get_candidate(&self, id: CandidateId) -> Result<Option<CandidateInfo>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        Ok(self.read_candidate(&rtxn, id)?)
    }

    fn list_candidates(&self, category: CategoryId) -> Result<Vec<CandidateInfo>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let mut result = Vec::new();
        for id in self.candidate_ids(&rtxn, category)? {
            let info = self.read_candidate(&rtxn, id)?.ok_or_else(|| {
                StoreError::Corruption(format!(
                    "category {category} indexes missing candidate {id}"
                ))
            })?;
            result.push(info);
        }
        Ok(result)
    }

    fn candidate_voters(&self, id: CandidateId) -> Result<Vec<VoterId>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let Some(candidate) = self.read_candidate(&rtxn, id)? else {
            return Err(StoreError::NotFound(format!("candidate {id}")));
        };

        let prefix = candidate.category.to_be_bytes();
        let wanted = id.to_be_bytes();
        let mut voters = Vec::new();
        for entry in self
            .participation_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (key, val) = entry.map_err(LmdbError::from)?;
            if val != wanted.as_slice() {
                continue;
            }
            let voter = voter_from_participation_key(key).ok_or_else(|| {
                StoreError::Corruption("malformed participation key".to_string())
            })?;
            voters.push(voter);
        }
        Ok(voters)
    }
}
