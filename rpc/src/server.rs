//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use ballot_ledger::VoteLedger;

use crate::error::RpcError;
use crate::handlers;

/// Shared state for every handler.
pub struct RpcState {
    pub ledger: Arc<VoteLedger>,
    /// Bearer token for `/api/admin`; `None` disables the admin routes.
    pub admin_token: Option<String>,
    pub started_at: Instant,
    pub enable_metrics: bool,
}

impl RpcState {
    pub fn new(ledger: Arc<VoteLedger>) -> Self {
        Self {
            ledger,
            admin_token: None,
            started_at: Instant::now(),
            enable_metrics: true,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }
}

/// All routes over `state`.
pub fn router(state: Arc<RpcState>) -> Router {
    Router::new()
        .route("/api/vote", get(handlers::ballot))
        .route("/api/vote/cast", post(handlers::cast_vote))
        .route("/api/vote/results", get(handlers::results))
        .route("/api/vote/results/:id", get(handlers::category_results))
        .route("/api/admin/create-category", post(handlers::create_category))
        .route("/api/admin/add-candidate", post(handlers::add_candidate))
        .route("/api/admin/toggle-voting", patch(handlers::toggle_voting))
        .route("/api/admin/categories", get(handlers::admin_categories))
        .route(
            "/api/admin/delete-category/:id",
            delete(handlers::delete_category),
        )
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    pub state: Arc<RpcState>,
    pub enable_cors: bool,
}

impl RpcServer {
    pub fn new(port: u16, state: Arc<RpcState>) -> Self {
        Self {
            port,
            state,
            enable_cors: false,
        }
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.enable_cors = enabled;
        self
    }

    /// Serve until `shutdown` resolves.
    pub async fn start(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Internal(format!("failed to bind {addr}: {e}")))?;

        let mut app = router(Arc::clone(&self.state));
        if self.enable_cors {
            app = app.layer(CorsLayer::permissive());
        }

        info!(%addr, cors = self.enable_cors, "RPC server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Internal(format!("server error: {e}")))
    }
}
