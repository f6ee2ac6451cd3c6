//! Node lifecycle: open, serve, stop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ballot_ledger::VoteLedger;
use ballot_rpc::{RpcServer, RpcState};
use ballot_store::LedgerStore;
use ballot_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment, Migrator};
use ballot_websocket::WebSocketServer;

use crate::{NodeConfig, NodeError, ShutdownController};

/// Maximum time to wait for background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BallotNode {
    config: NodeConfig,
    env: Arc<LmdbEnvironment>,
    ledger: Arc<VoteLedger>,
    shutdown: Arc<ShutdownController>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl BallotNode {
    /// Open the store at `config.data_dir` and build the ledger over it.
    ///
    /// Integrity problems are logged, not fatal. A database written by a
    /// newer schema is refused.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        check_data_dir(&config.data_dir).map_err(NodeError::DataDir)?;

        let env = LmdbEnvironment::open(&config.data_dir, config.max_dbs, config.lmdb_map_size)?;
        let env = Arc::new(env);

        let report = check_integrity(&env)?;
        if report.is_healthy() {
            tracing::info!(
                databases = report.databases_checked,
                entries = report.total_entries,
                categories = report.categories_checked,
                "LMDB integrity check passed"
            );
        } else {
            for error in &report.errors {
                tracing::warn!(error = %error, "LMDB integrity problem");
            }
        }

        Migrator::run(&env.meta_store())?;

        let store: Arc<dyn LedgerStore> = env.clone();
        let ledger = Arc::new(VoteLedger::new(store));

        Ok(Self {
            config,
            env,
            ledger,
            shutdown: Arc::new(ShutdownController::new()),
            task_handles: Vec::new(),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<VoteLedger> {
        &self.ledger
    }

    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// Spawn the servers and background tasks without waiting for a signal.
    pub fn spawn_tasks(&mut self) {
        self.spawn_prune_task();

        if self.config.enable_rpc {
            let state = RpcState::new(Arc::clone(&self.ledger))
                .with_admin_token(self.config.admin_token.clone())
                .with_metrics(self.config.enable_metrics);
            let server = RpcServer::new(self.config.rpc_port, Arc::new(state))
                .with_cors(self.config.enable_cors);
            if self.config.admin_token.as_deref().map_or(true, str::is_empty) {
                tracing::warn!("no admin_token configured, admin routes are disabled");
            }
            let signalled = self.shutdown.signalled();
            let handle = tokio::spawn(async move {
                match server.start(signalled).await {
                    Ok(()) => tracing::info!("RPC server exited"),
                    Err(e) => tracing::error!("RPC server error: {e}"),
                }
            });
            self.task_handles.push(handle);
        }

        if self.config.enable_websocket {
            let server = WebSocketServer::new(self.config.websocket_port, Arc::clone(&self.ledger));
            let signalled = self.shutdown.signalled();
            let handle = tokio::spawn(async move {
                match server.start(signalled).await {
                    Ok(()) => tracing::info!("WebSocket server exited"),
                    Err(e) => tracing::error!("WebSocket server error: {e}"),
                }
            });
            self.task_handles.push(handle);
        }
    }

    /// Drop broadcast channels nobody listens to any more.
    fn spawn_prune_task(&mut self) {
        let ledger = Arc::clone(&self.ledger);
        let mut shutdown_rx = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.prune_interval_secs.max(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("prune task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let pruned = ledger.hub().prune();
                        if pruned > 0 {
                            tracing::debug!(pruned, remaining = ledger.hub().channel_count(), "pruned idle tally channels");
                        }
                    }
                }
            }
        });
        self.task_handles.push(handle);
    }

    /// Start everything, then wait for SIGINT/SIGTERM.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        self.spawn_tasks();
        tracing::info!(
            rpc = self.config.enable_rpc,
            rpc_port = self.config.rpc_port,
            websocket = self.config.enable_websocket,
            websocket_port = self.config.websocket_port,
            "ballot node started"
        );
        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Stop the node gracefully.
    ///
    /// 1. Sends the shutdown signal to all background tasks.
    /// 2. Flushes LMDB.
    /// 3. Waits for background tasks to complete (with timeout).
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("ballot node stopping");
        self.shutdown.shutdown();

        if let Err(e) = self.env.sync() {
            tracing::warn!("LMDB force_sync failed: {e}");
        } else {
            tracing::info!("LMDB flushed to disk");
        }

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        tracing::info!("ballot node stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_directory_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().to_path_buf(),
            ..NodeConfig::default()
        };
        assert!(matches!(BallotNode::new(config), Err(NodeError::DataDir(_))));
    }
}
