//! In-memory, per-category mirror of committed candidate counters.
//!
//! Each category has its own slot behind its own mutex. Holding a slot's
//! lock is the exclusive section for that category: the admission gate keeps
//! it across commit, cache update and publish, so reads and writes for one
//! category are serialised while other categories proceed untouched. The
//! outer map lock is only held long enough to find or insert a slot.
//!
//! A slot starts unloaded and is rebuilt from the store before its first
//! read, after an invalidation, after a poisoned lock, and whenever a
//! committed counter disagrees with the cached one.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use ballot_store::{LedgerStore, StoreError};
use ballot_types::{CandidateId, CategoryId, TallyEntry, TallySnapshot};

use crate::{AdmissionError, LedgerMetrics};

/// Cached counters for one category.
#[derive(Debug, Default)]
pub(crate) struct CategoryTally {
    loaded: bool,
    entries: BTreeMap<CandidateId, TallyEntry>,
}

impl CategoryTally {
    pub(crate) fn snapshot(&self, category: CategoryId) -> TallySnapshot {
        TallySnapshot::new(category, self.entries.values().cloned().collect())
    }
}

pub(crate) type Slot = Arc<Mutex<CategoryTally>>;

pub struct TallyCache {
    store: Arc<dyn LedgerStore>,
    slots: RwLock<HashMap<CategoryId, Slot>>,
    metrics: Arc<LedgerMetrics>,
}

impl TallyCache {
    pub fn new(store: Arc<dyn LedgerStore>, metrics: Arc<LedgerMetrics>) -> Self {
        Self {
            store,
            slots: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Current snapshot of `category`, resynchronising first if needed.
    ///
    /// Fails with `StoreError::NotFound` if the category does not exist.
    pub fn get_tally(&self, category: CategoryId) -> Result<TallySnapshot, StoreError> {
        self.with_loaded(category, |tally| tally.snapshot(category))
    }

    /// Run `f` on the loaded slot while holding its lock. Slots created for
    /// categories the store does not have are dropped again.
    pub(crate) fn with_loaded<R>(
        &self,
        category: CategoryId,
        f: impl FnOnce(&CategoryTally) -> R,
    ) -> Result<R, StoreError> {
        let slot = self.slot(category);
        let mut tally = lock_slot(&slot);
        match self.ensure_loaded(category, &mut tally) {
            Ok(()) => Ok(f(&*tally)),
            Err(e) => {
                drop(tally);
                if matches!(e, StoreError::NotFound(_)) {
                    self.evict(category);
                }
                Err(e)
            }
        }
    }

    /// Mark `category` stale so the next access rebuilds it from the store.
    pub fn invalidate(&self, category: CategoryId) {
        let slot = self.read_slots().get(&category).cloned();
        if let Some(slot) = slot {
            lock_slot(&slot).loaded = false;
        }
    }

    /// Drop the slot for a deleted category.
    pub fn evict(&self, category: CategoryId) {
        let removed = self
            .slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&category);
        if let Some(slot) = removed {
            // Holders of the old slot must not keep serving it.
            lock_slot(&slot).loaded = false;
        }
    }

    /// Number of categories with a slot.
    pub fn len(&self) -> usize {
        self.read_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find or create the slot for `category`.
    pub(crate) fn slot(&self, category: CategoryId) -> Slot {
        if let Some(slot) = self.read_slots().get(&category) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(category).or_default())
    }

    pub(crate) fn ensure_loaded(
        &self,
        category: CategoryId,
        tally: &mut CategoryTally,
    ) -> Result<(), StoreError> {
        if tally.loaded {
            return Ok(());
        }
        self.resync(category, tally)
    }

    /// Rebuild `tally` from the store's committed counters.
    pub(crate) fn resync(
        &self,
        category: CategoryId,
        tally: &mut CategoryTally,
    ) -> Result<(), StoreError> {
        tally.loaded = false;
        if self.store.get_category(category)?.is_none() {
            return Err(StoreError::NotFound(format!("category {category}")));
        }
        let candidates = self.store.list_candidates(category)?;
        tally.entries = candidates
            .into_iter()
            .map(|c| {
                (
                    c.id,
                    TallyEntry {
                        candidate_id: c.id,
                        name: c.name,
                        votes: c.votes,
                    },
                )
            })
            .collect();
        tally.loaded = true;
        self.metrics.tally_resyncs.inc();
        tracing::debug!(
            category = %category,
            candidates = tally.entries.len(),
            "tally cache resynchronised"
        );
        Ok(())
    }

    /// Record the counter the store reported for `candidate` after a commit.
    ///
    /// The committed count must be exactly one more than the cached count.
    /// Anything else means the cache has drifted; it is rebuilt from the
    /// store, and if the store still does not account for the commit the
    /// slot is left unloaded and the request fails.
    pub(crate) fn apply_delta(
        &self,
        category: CategoryId,
        tally: &mut CategoryTally,
        candidate: CandidateId,
        new_count: u64,
    ) -> Result<(), AdmissionError> {
        let in_step = tally.loaded
            && tally
                .entries
                .get(&candidate)
                .is_some_and(|e| e.votes.checked_add(1) == Some(new_count));
        if in_step {
            if let Some(entry) = tally.entries.get_mut(&candidate) {
                entry.votes = new_count;
            }
            return Ok(());
        }

        tracing::warn!(
            category = %category,
            candidate = %candidate,
            committed = new_count,
            cached = ?tally.entries.get(&candidate).map(|e| e.votes),
            "tally cache diverged from store, resynchronising"
        );
        self.resync(category, tally)?;

        match tally.entries.get(&candidate) {
            Some(entry) if entry.votes >= new_count => Ok(()),
            found => {
                let stored = found.map(|e| e.votes);
                tally.loaded = false;
                tracing::error!(
                    category = %category,
                    candidate = %candidate,
                    committed = new_count,
                    stored = ?stored,
                    "store does not reflect committed vote after resync"
                );
                Err(AdmissionError::InternalInconsistency(format!(
                    "candidate {candidate} committed {new_count} votes but store reports {stored:?}"
                )))
            }
        }
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CategoryId, Slot>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lock a slot. A poisoned slot is recovered and marked for resync, since a
/// panic mid-update may have left it half-written.
pub(crate) fn lock_slot(slot: &Mutex<CategoryTally>) -> MutexGuard<'_, CategoryTally> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            slot.clear_poison();
            let mut guard = poisoned.into_inner();
            guard.loaded = false;
            tracing::warn!("recovered poisoned tally slot");
            guard
        }
    }
}
