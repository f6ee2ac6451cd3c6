//! Per-category fan-out of tally snapshots.
//!
//! Each category with subscribers has one `tokio::sync::watch` channel. A
//! watch channel holds only the latest value, so a slow subscriber sees
//! coalesced updates but always ends on the newest state, and publishing
//! never waits on any receiver. The hub only replaces the held snapshot with
//! one that [`TallySnapshot::supersedes`] it, so no subscriber can observe a
//! candidate's count going backwards.

use std::collections::HashMap;
use std::sync::RwLock;

use futures_util::stream::{self, Stream};
use prometheus::IntGauge;
use tokio::sync::watch;

use ballot_types::{CategoryId, TallySnapshot};

type Channel = watch::Sender<Option<TallySnapshot>>;

pub struct BroadcastHub {
    channels: RwLock<HashMap<CategoryId, Channel>>,
    live_subscribers: IntGauge,
}

impl BroadcastHub {
    pub fn new(live_subscribers: IntGauge) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            live_subscribers,
        }
    }

    /// Offer `snapshot` to the category's subscribers.
    ///
    /// Returns the number of subscribers that will observe it; zero when the
    /// category has no channel or the snapshot does not supersede the one
    /// already held.
    pub fn publish(&self, snapshot: &TallySnapshot) -> usize {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = channels.get(&snapshot.category_id) else {
            return 0;
        };
        if offer(tx, snapshot) {
            tx.receiver_count()
        } else {
            tracing::trace!(
                category = %snapshot.category_id,
                sequence = snapshot.sequence,
                "snapshot not newer than published state, skipped"
            );
            0
        }
    }

    /// Subscribe to a category's snapshots.
    ///
    /// `seed` is offered to the channel first, so the subscription's first
    /// item is the current tally rather than the next change.
    pub fn subscribe(&self, category: CategoryId, seed: Option<TallySnapshot>) -> TallySubscription {
        let rx = {
            let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
            let tx = channels
                .entry(category)
                .or_insert_with(|| watch::channel(None).0);
            if let Some(seed) = &seed {
                offer(tx, seed);
            }
            tx.subscribe()
        };
        self.live_subscribers.inc();
        tracing::debug!(category = %category, "tally subscription opened");
        TallySubscription {
            category,
            rx,
            initial_pending: true,
            gauge: self.live_subscribers.clone(),
        }
    }

    /// Close a category's channel. Its subscribers drain the last snapshot
    /// and then see their stream end.
    pub fn close(&self, category: CategoryId) -> bool {
        let removed = self
            .channels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&category);
        removed.is_some()
    }

    /// Drop channels nobody is listening to. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }

    pub fn subscriber_count(&self, category: CategoryId) -> usize {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&category)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Number of categories with a channel.
    pub fn channel_count(&self) -> usize {
        self.channels.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Replace the held snapshot if `snapshot` supersedes it.
fn offer(tx: &Channel, snapshot: &TallySnapshot) -> bool {
    tx.send_if_modified(|current| match current {
        Some(previous) if !snapshot.supersedes(previous) => false,
        _ => {
            *current = Some(snapshot.clone());
            true
        }
    })
}

/// A live view of one category's tally.
///
/// Dropping it unsubscribes; other subscribers and publishers are unaffected.
pub struct TallySubscription {
    category: CategoryId,
    rx: watch::Receiver<Option<TallySnapshot>>,
    initial_pending: bool,
    gauge: IntGauge,
}

impl TallySubscription {
    pub fn category(&self) -> CategoryId {
        self.category
    }

    /// Wait for the next snapshot.
    ///
    /// The first call returns the current snapshot immediately if there is
    /// one. Returns `None` once the channel is closed and drained.
    pub async fn next(&mut self) -> Option<TallySnapshot> {
        if self.initial_pending {
            self.initial_pending = false;
            let current = self.rx.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }
        loop {
            self.rx.changed().await.ok()?;
            let current = self.rx.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }
    }

    /// The most recent snapshot held by the channel, without waiting.
    pub fn latest(&self) -> Option<TallySnapshot> {
        self.rx.borrow().clone()
    }

    pub fn into_stream(self) -> impl Stream<Item = TallySnapshot> + Send {
        stream::unfold(self, |mut sub| async move {
            let snapshot = sub.next().await?;
            Some((snapshot, sub))
        })
    }
}

impl Drop for TallySubscription {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
