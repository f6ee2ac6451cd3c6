use ballot_store::StoreError;
use ballot_types::{BallotError, CategoryId};
use thiserror::Error;

/// Why a vote attempt was not accepted.
///
/// The first three are rejections decided by the ledger state and leave it
/// untouched. `StoreUnavailable` is the only retryable failure: retrying the
/// same `(voter, category)` after it is safe because a vote that did commit
/// will be reported as `AlreadyVoted`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("category is not open for voting")]
    CategoryNotOpen,

    #[error("voter has already voted in this category")]
    AlreadyVoted,

    #[error("candidate does not belong to this category")]
    CandidateNotFound,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl AdmissionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CategoryNotOpen => "CATEGORY_NOT_OPEN",
            Self::AlreadyVoted => "ALREADY_VOTED",
            Self::CandidateNotFound => "CANDIDATE_NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::InternalInconsistency(_) => "INTERNAL_INCONSISTENCY",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for AdmissionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Backend(msg) => Self::StoreUnavailable(msg),
            other => Self::InternalInconsistency(other.to_string()),
        }
    }
}

/// Errors from category/candidate lifecycle operations and result queries.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("a category named '{0}' already exists")]
    DuplicateCategory(String),

    #[error("category {0} is open; close voting before deleting it")]
    CategoryStillOpen(CategoryId),

    #[error(transparent)]
    Invalid(#[from] BallotError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            Self::DuplicateCategory(_) => "DUPLICATE_CATEGORY",
            Self::CategoryStillOpen(_) => "CATEGORY_STILL_OPEN",
            Self::Invalid(_) => "VALIDATION_ERROR",
            Self::Store(e) if e.is_transient() => "STORE_UNAVAILABLE",
            Self::Store(_) => "INTERNAL_INCONSISTENCY",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}
