//! RPC request handlers.
//!
//! Store work is synchronous, so every handler that touches the ledger hops
//! onto the blocking pool.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use ballot_ledger::{BallotCategory, CategoryView, Projection, VoteReceipt};
use ballot_store::{CandidateInfo, CategoryInfo};
use ballot_types::{CandidateId, CategoryId, Timestamp};

use crate::auth::{AdminAuth, VoterIdentity};
use crate::error::RpcError;
use crate::pagination::{paginate, PaginationMeta, PaginationParams};
use crate::server::RpcState;

/// Run synchronous ledger work on the blocking pool.
async fn run_blocking<T, E, F>(f: F) -> Result<T, RpcError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<RpcError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RpcError::Internal(format!("blocking task failed: {e}")))?
        .map_err(Into::into)
}

// ── Voter ────────────────────────────────────────────────────────────────

pub async fn ballot(
    State(state): State<Arc<RpcState>>,
    VoterIdentity(voter): VoterIdentity,
) -> Result<Json<Vec<BallotCategory>>, RpcError> {
    let ledger = Arc::clone(&state.ledger);
    let categories = run_blocking(move || ledger.catalog().ballot_for(&voter)).await?;
    Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
pub struct CastRequest {
    pub category_id: CategoryId,
    pub candidate_id: CandidateId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CastResponse {
    pub message: String,
    pub receipt: VoteReceipt,
}

pub async fn cast_vote(
    State(state): State<Arc<RpcState>>,
    VoterIdentity(voter): VoterIdentity,
    payload: Result<Json<CastRequest>, JsonRejection>,
) -> Result<Json<CastResponse>, RpcError> {
    let Json(req) = payload?;
    let ledger = Arc::clone(&state.ledger);
    let receipt =
        run_blocking(move || ledger.attempt_vote(&voter, req.category_id, req.candidate_id))
            .await?;
    Ok(Json(CastResponse {
        message: "Vote cast successfully".to_string(),
        receipt,
    }))
}

// ── Results ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsPage {
    pub results: Vec<Projection>,
    pub pagination: PaginationMeta,
}

pub async fn results(
    State(state): State<Arc<RpcState>>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<ResultsPage>, RpcError> {
    let Query(params) = params?;
    let ledger = Arc::clone(&state.ledger);
    let projections = run_blocking(move || ledger.project_all()).await?;
    let (results, pagination) = paginate(projections, &params).map_err(RpcError::InvalidRequest)?;
    Ok(Json(ResultsPage {
        results,
        pagination,
    }))
}

pub async fn category_results(
    State(state): State<Arc<RpcState>>,
    id: Result<Path<CategoryId>, PathRejection>,
) -> Result<Json<Projection>, RpcError> {
    let Path(id) = id?;
    let ledger = Arc::clone(&state.ledger);
    let projection = run_blocking(move || ledger.project(id)).await?;
    Ok(Json(projection))
}

// ── Admin ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

pub async fn create_category(
    State(state): State<Arc<RpcState>>,
    admin: AdminAuth,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CategoryInfo>), RpcError> {
    let Json(req) = payload?;
    let ledger = Arc::clone(&state.ledger);
    let info = run_blocking(move || {
        ledger.catalog().create_category(
            &req.name,
            req.description.as_deref(),
            admin.actor,
            Timestamp::now(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(info)))
}

#[derive(Debug, Deserialize)]
pub struct AddCandidateRequest {
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

pub async fn add_candidate(
    State(state): State<Arc<RpcState>>,
    _admin: AdminAuth,
    payload: Result<Json<AddCandidateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CandidateInfo>), RpcError> {
    let Json(req) = payload?;
    let ledger = Arc::clone(&state.ledger);
    let candidate = run_blocking(move || {
        ledger
            .catalog()
            .add_candidate(req.category_id, &req.name, req.description.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(candidate)))
}

#[derive(Debug, Deserialize)]
pub struct ToggleVotingRequest {
    pub category_id: CategoryId,
    pub is_open: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleVotingResponse {
    pub message: String,
    pub category: CategoryInfo,
}

pub async fn toggle_voting(
    State(state): State<Arc<RpcState>>,
    _admin: AdminAuth,
    payload: Result<Json<ToggleVotingRequest>, JsonRejection>,
) -> Result<Json<ToggleVotingResponse>, RpcError> {
    let Json(req) = payload?;
    let ledger = Arc::clone(&state.ledger);
    let category =
        run_blocking(move || ledger.catalog().set_voting(req.category_id, req.is_open)).await?;
    Ok(Json(ToggleVotingResponse {
        message: "Voting status updated".to_string(),
        category,
    }))
}

pub async fn admin_categories(
    State(state): State<Arc<RpcState>>,
    _admin: AdminAuth,
) -> Result<Json<Vec<CategoryView>>, RpcError> {
    let ledger = Arc::clone(&state.ledger);
    let categories = run_blocking(move || ledger.catalog().categories()).await?;
    Ok(Json(categories))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteCategoryResponse {
    pub message: String,
    pub candidates_removed: usize,
}

pub async fn delete_category(
    State(state): State<Arc<RpcState>>,
    _admin: AdminAuth,
    id: Result<Path<CategoryId>, PathRejection>,
) -> Result<Json<DeleteCategoryResponse>, RpcError> {
    let Path(id) = id?;
    let ledger = Arc::clone(&state.ledger);
    let candidates_removed = run_blocking(move || ledger.catalog().delete_category(id)).await?;
    Ok(Json(DeleteCategoryResponse {
        message: "Category and all its candidates deleted".to_string(),
        candidates_removed,
    }))
}

// ── Node ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime: String,
    pub uptime_secs: u64,
    pub live_channels: usize,
}

pub async fn health(State(state): State<Arc<RpcState>>) -> Json<HealthResponse> {
    let elapsed = state.started_at.elapsed();
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime: ballot_utils::format_duration(elapsed),
        uptime_secs: elapsed.as_secs(),
        live_channels: state.ledger.hub().channel_count(),
    })
}

pub async fn metrics(State(state): State<Arc<RpcState>>) -> Result<impl IntoResponse, RpcError> {
    if !state.enable_metrics {
        return Err(RpcError::MetricsDisabled);
    }
    let body = state.ledger.metrics().encode_text()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
