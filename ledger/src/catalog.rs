//! Category and candidate lifecycle.
//!
//! Every mutation goes to the store first; the tally cache and broadcast hub
//! are then brought in line so readers and subscribers never see a category
//! the store no longer has, or miss a candidate it does have.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ballot_store::{CandidateInfo, CategoryInfo, LedgerStore, NewCandidate, NewCategory, StoreError};
use ballot_types::limits::{validate_description, validate_name};
use ballot_types::{CandidateId, CategoryId, Timestamp, VoterId};

use crate::tally_cache::lock_slot;
use crate::{BroadcastHub, CatalogError, TallyCache};

/// A category with its candidates, as administrators see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: CategoryInfo,
    pub candidates: Vec<CandidateInfo>,
}

/// An open category as a voter sees it. Counts are not shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub has_voted: bool,
    pub candidates: Vec<BallotCandidate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCandidate {
    pub candidate_id: CandidateId,
    pub name: String,
    pub description: String,
}

pub struct Catalog {
    store: Arc<dyn LedgerStore>,
    cache: Arc<TallyCache>,
    hub: Arc<BroadcastHub>,
}

impl Catalog {
    pub fn new(store: Arc<dyn LedgerStore>, cache: Arc<TallyCache>, hub: Arc<BroadcastHub>) -> Self {
        Self { store, cache, hub }
    }

    /// Create a closed category.
    pub fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<String>,
        now: Timestamp,
    ) -> Result<CategoryInfo, CatalogError> {
        let new = NewCategory {
            name: validate_name(name)?,
            description: validate_description(description)?,
            created_by,
        };
        let info = self
            .store
            .create_category(&new, now)
            .map_err(|e| match e {
                StoreError::Duplicate(_) => CatalogError::DuplicateCategory(new.name.clone()),
                other => other.into(),
            })?;
        tracing::info!(category = %info.id, name = %info.name, "category created");
        Ok(info)
    }

    pub fn add_candidate(
        &self,
        category: CategoryId,
        name: &str,
        description: Option<&str>,
    ) -> Result<CandidateInfo, CatalogError> {
        let new = NewCandidate {
            category,
            name: validate_name(name)?,
            description: validate_description(description)?,
        };
        let candidate = self.store.add_candidate(&new).map_err(|e| match e {
            StoreError::NotFound(_) => CatalogError::CategoryNotFound(category),
            other => other.into(),
        })?;
        tracing::info!(
            category = %category,
            candidate = %candidate.id,
            name = %candidate.name,
            "candidate added"
        );
        self.refresh(category);
        Ok(candidate)
    }

    /// Open or close voting.
    pub fn set_voting(&self, category: CategoryId, open: bool) -> Result<CategoryInfo, CatalogError> {
        let info = self.store.set_open(category, open).map_err(|e| match e {
            StoreError::NotFound(_) => CatalogError::CategoryNotFound(category),
            other => other.into(),
        })?;
        tracing::info!(category = %category, open, "voting toggled");
        Ok(info)
    }

    /// Delete a closed category and everything in it. Subscribers to it see
    /// their streams end. Returns the number of candidates removed.
    pub fn delete_category(&self, category: CategoryId) -> Result<usize, CatalogError> {
        let removed = self.store.delete_category(category).map_err(|e| match e {
            StoreError::NotFound(_) => CatalogError::CategoryNotFound(category),
            StoreError::Conflict(_) => CatalogError::CategoryStillOpen(category),
            other => other.into(),
        })?;
        self.cache.evict(category);
        self.hub.close(category);
        tracing::info!(category = %category, candidates = removed, "category deleted");
        Ok(removed)
    }

    pub fn get_category(&self, category: CategoryId) -> Result<CategoryView, CatalogError> {
        let info = self
            .store
            .get_category(category)?
            .ok_or(CatalogError::CategoryNotFound(category))?;
        self.view(info)
    }

    /// Every category with its candidates, in creation order.
    pub fn categories(&self) -> Result<Vec<CategoryView>, CatalogError> {
        self.store
            .iter_categories()?
            .into_iter()
            .map(|info| self.view(info))
            .collect()
    }

    /// Open categories with a per-category `has_voted` flag for `voter`.
    pub fn ballot_for(&self, voter: &VoterId) -> Result<Vec<BallotCategory>, CatalogError> {
        let voted: HashSet<CategoryId> = self.store.voted_categories(voter)?.into_iter().collect();
        let mut ballot = Vec::new();
        for info in self.store.iter_categories()? {
            if !info.is_open {
                continue;
            }
            let candidates = self
                .store
                .list_candidates(info.id)?
                .into_iter()
                .map(|c| BallotCandidate {
                    candidate_id: c.id,
                    name: c.name,
                    description: c.description,
                })
                .collect();
            ballot.push(BallotCategory {
                category_id: info.id,
                has_voted: voted.contains(&info.id),
                name: info.name,
                description: info.description,
                candidates,
            });
        }
        Ok(ballot)
    }

    fn view(&self, info: CategoryInfo) -> Result<CategoryView, CatalogError> {
        let candidates = self.store.list_candidates(info.id)?;
        Ok(CategoryView {
            category: info,
            candidates,
        })
    }

    /// Rebuild the category's cache entry and let subscribers see the new
    /// candidate list. Failures leave the entry stale for the next reader;
    /// a category deleted in the meantime loses its entry.
    fn refresh(&self, category: CategoryId) {
        let slot = self.cache.slot(category);
        let mut tally = lock_slot(&slot);
        match self.cache.resync(category, &mut tally) {
            Ok(()) => {
                self.hub.publish(&tally.snapshot(category));
            }
            Err(StoreError::NotFound(_)) => {
                drop(tally);
                self.cache.evict(category);
                tracing::debug!(category = %category, "category gone before refresh");
            }
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "tally refresh failed");
            }
        }
    }
}
