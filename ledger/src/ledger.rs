use std::sync::Arc;

use ballot_store::{LedgerStore, StoreError};
use ballot_types::{CandidateId, CategoryId, TallySnapshot, VoterId};

use crate::{
    AdmissionError, AdmissionGate, BroadcastHub, Catalog, CatalogError, LedgerMetrics, Projection,
    ResultProjector, TallyCache, TallySubscription, VoteReceipt,
};

/// The vote ledger: one store, one tally cache, one broadcast hub, and the
/// gate, projector and catalog operating on them.
pub struct VoteLedger {
    store: Arc<dyn LedgerStore>,
    cache: Arc<TallyCache>,
    hub: Arc<BroadcastHub>,
    gate: AdmissionGate,
    projector: ResultProjector,
    catalog: Catalog,
    metrics: Arc<LedgerMetrics>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_metrics(store, Arc::new(LedgerMetrics::new()))
    }

    pub fn with_metrics(store: Arc<dyn LedgerStore>, metrics: Arc<LedgerMetrics>) -> Self {
        let cache = Arc::new(TallyCache::new(Arc::clone(&store), Arc::clone(&metrics)));
        let hub = Arc::new(BroadcastHub::new(metrics.live_subscribers.clone()));
        let gate = AdmissionGate::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&hub),
            Arc::clone(&metrics),
        );
        let projector = ResultProjector::new(Arc::clone(&store), Arc::clone(&cache));
        let catalog = Catalog::new(Arc::clone(&store), Arc::clone(&cache), Arc::clone(&hub));
        Self {
            store,
            cache,
            hub,
            gate,
            projector,
            catalog,
            metrics,
        }
    }

    pub fn attempt_vote(
        &self,
        voter: &VoterId,
        category: CategoryId,
        candidate: CandidateId,
    ) -> Result<VoteReceipt, AdmissionError> {
        self.gate.attempt_vote(voter, category, candidate)
    }

    pub fn get_tally(&self, category: CategoryId) -> Result<TallySnapshot, CatalogError> {
        self.cache.get_tally(category).map_err(|e| not_found_as(category, e))
    }

    /// Subscribe to live tallies. The first item is the current tally.
    pub fn subscribe(&self, category: CategoryId) -> Result<TallySubscription, CatalogError> {
        // Seeding under the slot lock orders the seed before any later commit.
        self.cache
            .with_loaded(category, |tally| {
                self.hub.subscribe(category, Some(tally.snapshot(category)))
            })
            .map_err(|e| not_found_as(category, e))
    }

    pub fn project(&self, category: CategoryId) -> Result<Projection, CatalogError> {
        self.projector.project(category)
    }

    pub fn project_all(&self) -> Result<Vec<Projection>, CatalogError> {
        self.projector.project_all()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn metrics(&self) -> &Arc<LedgerMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }
}

fn not_found_as(category: CategoryId, e: StoreError) -> CatalogError {
    match e {
        StoreError::NotFound(_) => CatalogError::CategoryNotFound(category),
        other => CatalogError::Store(other),
    }
}
