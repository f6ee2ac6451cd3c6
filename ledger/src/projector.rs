//! Ranked, read-only result views.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ballot_store::{CategoryInfo, LedgerStore, StoreError};
use ballot_types::{CandidateId, CategoryId, TallySnapshot, Timestamp};

use crate::{CatalogError, TallyCache};

/// One candidate's place in a projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based rank; candidates with equal votes share a position.
    pub position: u32,
    pub candidate_id: CandidateId,
    pub name: String,
    pub votes: u64,
    /// Share of the category's votes, rounded to two decimals.
    pub percentage: f64,
}

/// A category's results, candidates ranked by votes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub category_id: CategoryId,
    pub name: String,
    pub is_open: bool,
    pub created_at: Timestamp,
    pub total_votes: u64,
    pub standings: Vec<Standing>,
}

impl Projection {
    pub fn build(info: &CategoryInfo, snapshot: &TallySnapshot) -> Self {
        let total = snapshot.total_votes();
        let mut standings = Vec::with_capacity(snapshot.entries.len());
        let mut position = 0u32;
        let mut previous_votes = None;
        for (index, entry) in snapshot.entries.iter().enumerate() {
            if previous_votes != Some(entry.votes) {
                position = index as u32 + 1;
                previous_votes = Some(entry.votes);
            }
            standings.push(Standing {
                position,
                candidate_id: entry.candidate_id,
                name: entry.name.clone(),
                votes: entry.votes,
                percentage: percentage(entry.votes, total),
            });
        }
        Self {
            category_id: info.id,
            name: info.name.clone(),
            is_open: info.is_open,
            created_at: info.created_at,
            total_votes: total,
            standings,
        }
    }
}

fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 10_000.0 / total as f64).round() / 100.0
}

pub struct ResultProjector {
    store: Arc<dyn LedgerStore>,
    cache: Arc<TallyCache>,
}

impl ResultProjector {
    pub fn new(store: Arc<dyn LedgerStore>, cache: Arc<TallyCache>) -> Self {
        Self { store, cache }
    }

    pub fn project(&self, category: CategoryId) -> Result<Projection, CatalogError> {
        let info = self
            .store
            .get_category(category)?
            .ok_or(CatalogError::CategoryNotFound(category))?;
        let snapshot = self.tally(category)?;
        Ok(Projection::build(&info, &snapshot))
    }

    /// Every category, open or closed, newest first.
    pub fn project_all(&self) -> Result<Vec<Projection>, CatalogError> {
        let mut categories = self.store.iter_categories()?;
        categories.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let mut result = Vec::with_capacity(categories.len());
        for info in &categories {
            match self.tally(info.id) {
                Ok(snapshot) => result.push(Projection::build(info, &snapshot)),
                // Deleted since the listing.
                Err(CatalogError::CategoryNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    fn tally(&self, category: CategoryId) -> Result<TallySnapshot, CatalogError> {
        self.cache.get_tally(category).map_err(|e| match e {
            StoreError::NotFound(_) => CatalogError::CategoryNotFound(category),
            other => CatalogError::Store(other),
        })
    }
}
