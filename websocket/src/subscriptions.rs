//! Wire messages and per-client subscription bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use ballot_types::{CategoryId, TallySnapshot};

/// A frame sent by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { category_id: CategoryId },
    Unsubscribe { category_id: CategoryId },
    Ping,
}

/// A frame sent by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack {
        action: String,
        category_id: CategoryId,
    },
    Tally {
        snapshot: TallySnapshot,
    },
    /// The category was deleted; no further tallies will follow.
    Closed {
        category_id: CategoryId,
    },
    Error {
        message: String,
    },
    Pong,
}

/// The forwarder tasks of one connected client, one per category.
#[derive(Default)]
pub struct ClientSubscriptions {
    forwarders: HashMap<CategoryId, JoinHandle<()>>,
}

impl ClientSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the forwarder for `category`, replacing (and aborting) any
    /// previous one.
    pub fn insert(&mut self, category: CategoryId, handle: JoinHandle<()>) {
        if let Some(old) = self.forwarders.insert(category, handle) {
            old.abort();
        }
    }

    /// Abort the forwarder for `category`. Returns whether there was one.
    pub fn remove(&mut self, category: CategoryId) -> bool {
        match self.forwarders.remove(&category) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, category: CategoryId) -> bool {
        self.forwarders
            .get(&category)
            .is_some_and(|h| !h.is_finished())
    }

    pub fn len(&self) -> usize {
        self.forwarders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forwarders.is_empty()
    }

    /// Abort every forwarder.
    pub fn clear(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }
}

impl Drop for ClientSubscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}
