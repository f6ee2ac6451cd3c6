//! RPC error types.
//!
//! Every failure leaves the server as `{ "error": CODE, "message": ..., "retryable": bool }`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use ballot_ledger::{AdmissionError, CatalogError};
use ballot_types::BallotError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("missing X-Voter-Id header")]
    MissingVoter,

    #[error("invalid voter id: {0}")]
    InvalidVoter(BallotError),

    #[error("missing admin credentials")]
    Unauthorized,

    #[error("admin credentials rejected")]
    Forbidden,

    #[error("admin routes are disabled: no admin token is configured")]
    AdminDisabled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics are disabled")]
    MetricsDisabled,

    #[error("metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("server error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl RpcError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Admission(e) => match e {
                AdmissionError::CategoryNotOpen | AdmissionError::AlreadyVoted => {
                    StatusCode::BAD_REQUEST
                }
                AdmissionError::CandidateNotFound => StatusCode::NOT_FOUND,
                AdmissionError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AdmissionError::InternalInconsistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(e) => match e {
                CatalogError::CategoryNotFound(_) => StatusCode::NOT_FOUND,
                CatalogError::DuplicateCategory(_) | CatalogError::CategoryStillOpen(_) => {
                    StatusCode::CONFLICT
                }
                CatalogError::Invalid(_) => StatusCode::BAD_REQUEST,
                CatalogError::Store(s) if s.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
                CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::MissingVoter | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AdminDisabled => StatusCode::FORBIDDEN,
            Self::InvalidVoter(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MetricsDisabled => StatusCode::NOT_FOUND,
            Self::Metrics(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Admission(e) => e.code(),
            Self::Catalog(e) => e.code(),
            Self::MissingVoter | Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden | Self::AdminDisabled => "FORBIDDEN",
            Self::InvalidVoter(_) => "VALIDATION_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::MetricsDisabled => "NOT_FOUND",
            Self::Metrics(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Admission(e) => e.is_retryable(),
            Self::Catalog(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for RpcError {
    fn from(e: JsonRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

impl From<PathRejection> for RpcError {
    fn from(e: PathRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

impl From<QueryRejection> for RpcError {
    fn from(e: QueryRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_store::StoreError;
    use ballot_types::CategoryId;

    #[test]
    fn admission_statuses() {
        let cases = [
            (AdmissionError::CategoryNotOpen, StatusCode::BAD_REQUEST),
            (AdmissionError::AlreadyVoted, StatusCode::BAD_REQUEST),
            (AdmissionError::CandidateNotFound, StatusCode::NOT_FOUND),
            (
                AdmissionError::StoreUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AdmissionError::InternalInconsistency("drift".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(RpcError::from(error).status_code(), status);
        }
    }

    #[test]
    fn catalog_statuses() {
        let still_open = RpcError::from(CatalogError::CategoryStillOpen(CategoryId::new(1)));
        assert_eq!(still_open.status_code(), StatusCode::CONFLICT);
        assert_eq!(still_open.code(), "CATEGORY_STILL_OPEN");

        let backend = RpcError::from(CatalogError::Store(StoreError::Backend("io".into())));
        assert_eq!(backend.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(backend.is_retryable());
    }

    #[test]
    fn only_store_unavailable_is_retryable() {
        assert!(RpcError::from(AdmissionError::StoreUnavailable("x".into())).is_retryable());
        assert!(!RpcError::from(AdmissionError::AlreadyVoted).is_retryable());
        assert!(!RpcError::Forbidden.is_retryable());
    }
}
