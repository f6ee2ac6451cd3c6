//! Composite key layouts.
//!
//! - `category_candidates`: `category_be(8) ++ candidate_be(8)`
//! - `participation`:       `category_be(8) ++ voter`  → `candidate_be(8)`
//! - `voter_index`:         `voter ++ 0x00 ++ category_be(8)`
//!
//! Voter ids never contain NUL, so the voter index prefix is unambiguous.

use ballot_types::{CandidateId, CategoryId, VoterId};

pub(crate) const ID_LEN: usize = 8;

pub(crate) fn category_candidate_key(category: CategoryId, candidate: CandidateId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..ID_LEN].copy_from_slice(&category.to_be_bytes());
    key[ID_LEN..].copy_from_slice(&candidate.to_be_bytes());
    key
}

pub(crate) fn participation_key(category: CategoryId, voter: &VoterId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN + voter.as_bytes().len());
    key.extend_from_slice(&category.to_be_bytes());
    key.extend_from_slice(voter.as_bytes());
    key
}

pub(crate) fn voter_index_prefix(voter: &VoterId) -> Vec<u8> {
    let mut key = Vec::with_capacity(voter.as_bytes().len() + 1 + ID_LEN);
    key.extend_from_slice(voter.as_bytes());
    key.push(0);
    key
}

pub(crate) fn voter_index_key(voter: &VoterId, category: CategoryId) -> Vec<u8> {
    let mut key = voter_index_prefix(voter);
    key.extend_from_slice(&category.to_be_bytes());
    key
}

/// Split a participation key back into its voter part.
pub(crate) fn voter_from_participation_key(key: &[u8]) -> Option<VoterId> {
    let raw = std::str::from_utf8(key.get(ID_LEN..)?).ok()?;
    VoterId::parse(raw).ok()
}
