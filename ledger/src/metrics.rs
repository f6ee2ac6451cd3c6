//! Prometheus metrics for the vote ledger.
//!
//! [`LedgerMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Central collection of all ledger-level Prometheus metrics.
pub struct LedgerMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Votes committed by the admission gate.
    pub votes_accepted: IntCounter,
    /// Vote attempts that were not committed, labelled by error code.
    pub votes_rejected: IntCounterVec,
    /// Tally cache entries rebuilt from the store.
    pub tally_resyncs: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Currently open tally subscriptions across all categories.
    pub live_subscribers: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one admission attempt, in milliseconds.
    pub admission_latency_ms: Histogram,
}

impl LedgerMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let votes_accepted = register_int_counter_with_registry!(
            Opts::new("ballot_votes_accepted_total", "Total votes accepted"),
            registry
        )
        .expect("failed to register votes_accepted counter");

        let votes_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "ballot_votes_rejected_total",
                "Total vote attempts rejected, by reason"
            ),
            &["reason"],
            registry
        )
        .expect("failed to register votes_rejected counter");

        let tally_resyncs = register_int_counter_with_registry!(
            Opts::new(
                "ballot_tally_resyncs_total",
                "Total tally cache entries resynchronised from the store"
            ),
            registry
        )
        .expect("failed to register tally_resyncs counter");

        let live_subscribers = register_int_gauge_with_registry!(
            Opts::new(
                "ballot_live_subscribers",
                "Current number of live tally subscriptions"
            ),
            registry
        )
        .expect("failed to register live_subscribers gauge");

        // 0.05 ms → ~800 ms
        let admission_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "ballot_admission_latency_ms",
                "Vote admission latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.05, 2.0, 15).expect("valid buckets")),
            registry
        )
        .expect("failed to register admission_latency_ms histogram");

        Self {
            registry,
            votes_accepted,
            votes_rejected,
            tally_resyncs,
            live_subscribers,
            admission_latency_ms,
        }
    }

    /// Encode every metric in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
